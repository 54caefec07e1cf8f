//! Prepaid wallet: balance, ledger and credit/debit posting

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::core::client::GatewayApi;
use crate::core::error::ClientError;
use crate::core::models::{NewTransaction, Transaction, TransactionKind, TransactionStatus, Wallet};
use crate::utils::constants::{TOP_UP_MAX, TOP_UP_MIN};
use crate::utils::format_money;

pub const TOP_UP_DESCRIPTION: &str = "Wallet top-up";
pub const DEBIT_DESCRIPTION: &str = "Wallet debit";

/// Balance plus the ledger that produced it
#[derive(Debug, Clone)]
pub struct WalletSnapshot {
    pub wallet: Wallet,
    pub transactions: Vec<Transaction>,
}

impl WalletSnapshot {
    pub fn balance(&self) -> Decimal {
        self.wallet.balance
    }

    pub fn summary(&self, now: DateTime<Utc>) -> WalletSummary {
        WalletSummary::from_transactions(&self.transactions, now)
    }
}

#[derive(Clone)]
pub struct WalletManager {
    api: Arc<dyn GatewayApi>,
}

impl WalletManager {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        Self { api }
    }

    /// Fetch balance and transactions together
    pub async fn snapshot(&self) -> Result<WalletSnapshot, ClientError> {
        let (wallet, mut transactions) =
            tokio::try_join!(self.api.get_wallet(), self.api.list_transactions())?;

        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(WalletSnapshot { wallet, transactions })
    }

    pub async fn balance(&self) -> Result<Decimal, ClientError> {
        Ok(self.api.get_wallet().await?.balance)
    }

    /// Credit the wallet and return the re-fetched balance
    pub async fn top_up(&self, amount: Decimal) -> Result<Decimal, ClientError> {
        validate_top_up(amount)?;

        self.post(TransactionKind::Credit, amount, TOP_UP_DESCRIPTION, None)
            .await?;
        self.balance().await
    }

    /// Debit the wallet and return the re-fetched balance
    pub async fn charge(&self, amount: Decimal, description: &str) -> Result<Decimal, ClientError> {
        if amount <= Decimal::ZERO {
            return Err(ClientError::validation("Charge amount must be positive"));
        }

        self.post(TransactionKind::Debit, amount, description, None)
            .await?;
        self.balance().await
    }

    /// Apply a signed change: non-negative credits, negative debits
    pub async fn adjust(
        &self,
        signed_amount: Decimal,
        description: Option<&str>,
    ) -> Result<Decimal, ClientError> {
        if signed_amount.is_zero() {
            return Err(ClientError::validation("Adjustment amount must not be zero"));
        }

        let (kind, default_description) = if signed_amount >= Decimal::ZERO {
            (TransactionKind::Credit, TOP_UP_DESCRIPTION)
        } else {
            (TransactionKind::Debit, DEBIT_DESCRIPTION)
        };

        self.post(
            kind,
            signed_amount.abs(),
            description.unwrap_or(default_description),
            None,
        )
        .await?;
        self.balance().await
    }

    /// Create a single transaction, optionally under an idempotency key
    pub async fn post(
        &self,
        kind: TransactionKind,
        amount: Decimal,
        description: &str,
        idempotency_key: Option<String>,
    ) -> Result<Transaction, ClientError> {
        let request = NewTransaction {
            kind,
            amount,
            description: description.to_string(),
            idempotency_key,
        };

        let transaction = self.api.create_transaction(&request).await?;
        tracing::info!(
            id = transaction.id,
            kind = %kind,
            amount = %amount,
            "posted wallet transaction"
        );
        Ok(transaction)
    }
}

pub fn validate_top_up(amount: Decimal) -> Result<(), ClientError> {
    let min = Decimal::from(TOP_UP_MIN);
    let max = Decimal::from(TOP_UP_MAX);
    if amount < min || amount > max {
        return Err(ClientError::validation(format!(
            "Top-up amount must be between {} and {}",
            format_money(min),
            format_money(max)
        )));
    }
    Ok(())
}

/// Totals derived from the transaction list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletSummary {
    /// Completed credits
    pub total_top_ups: Decimal,
    /// Completed debits
    pub total_spent: Decimal,
    pub spent_last_30_days: Decimal,
    pub pending_count: usize,
    pub transaction_count: usize,
}

impl WalletSummary {
    pub fn from_transactions(transactions: &[Transaction], now: DateTime<Utc>) -> Self {
        let month_ago = now - Duration::days(30);
        let mut summary = Self {
            transaction_count: transactions.len(),
            ..Default::default()
        };

        for tx in transactions {
            match (tx.status, tx.kind) {
                (TransactionStatus::Completed, TransactionKind::Credit) => {
                    summary.total_top_ups += tx.amount;
                }
                (TransactionStatus::Completed, TransactionKind::Debit) => {
                    summary.total_spent += tx.amount;
                    if tx.created_at > month_ago && tx.created_at <= now {
                        summary.spent_last_30_days += tx.amount;
                    }
                }
                (TransactionStatus::Pending, _) => summary.pending_count += 1,
                (TransactionStatus::Failed, _) => {}
            }
        }

        summary
    }

    /// Balance implied by the ledger on top of an opening balance
    pub fn ledger_balance(&self, opening: Decimal) -> Decimal {
        opening + self.total_top_ups - self.total_spent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::MockGatewayApi;
    use crate::core::testing::{transaction, wallet};
    use std::sync::Mutex;

    /// Mock backend whose balance follows completed transactions
    fn ledger_backend(opening: Decimal) -> (MockGatewayApi, Arc<Mutex<Decimal>>) {
        let balance = Arc::new(Mutex::new(opening));
        let mut api = MockGatewayApi::new();

        let posted = Arc::clone(&balance);
        api.expect_create_transaction().returning(move |req: &NewTransaction| {
            let mut balance = posted.lock().unwrap();
            match req.kind {
                TransactionKind::Credit => *balance += req.amount,
                TransactionKind::Debit => *balance -= req.amount,
            }
            Ok(transaction(
                1,
                req.kind,
                req.amount,
                TransactionStatus::Completed,
                Utc::now(),
            ))
        });

        let read = Arc::clone(&balance);
        api.expect_get_wallet()
            .returning(move || Ok(wallet(*read.lock().unwrap())));

        (api, balance)
    }

    #[tokio::test]
    async fn test_credit_then_debit_nets_out() {
        let opening = Decimal::new(100, 0);
        let (api, _) = ledger_backend(opening);
        let manager = WalletManager::new(Arc::new(api));

        manager.top_up(Decimal::new(25, 0)).await.unwrap();
        let balance = manager.charge(Decimal::new(10, 0), "SMS").await.unwrap();

        assert_eq!(balance, opening + Decimal::new(15, 0));
    }

    #[tokio::test]
    async fn test_adjust_picks_direction() {
        let (api, balance) = ledger_backend(Decimal::new(50, 0));
        let manager = WalletManager::new(Arc::new(api));

        manager.adjust(Decimal::new(-20, 0), None).await.unwrap();
        assert_eq!(*balance.lock().unwrap(), Decimal::new(30, 0));

        manager.adjust(Decimal::new(5, 0), Some("Promo")).await.unwrap();
        assert_eq!(*balance.lock().unwrap(), Decimal::new(35, 0));

        assert!(manager.adjust(Decimal::ZERO, None).await.is_err());
    }

    #[tokio::test]
    async fn test_top_up_bounds_checked_locally() {
        let manager = WalletManager::new(Arc::new(MockGatewayApi::new()));

        let err = manager.top_up(Decimal::new(4, 0)).await.unwrap_err();
        assert_eq!(
            err.user_message("top up wallet"),
            "Top-up amount must be between $5.00 and $5000.00"
        );
        assert!(manager.top_up(Decimal::new(5001, 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_sorted_newest_first() {
        let now = Utc::now();
        let mut api = MockGatewayApi::new();
        api.expect_get_wallet()
            .returning(|| Ok(wallet(Decimal::new(12, 0))));
        api.expect_list_transactions().returning(move || {
            Ok(vec![
                transaction(1, TransactionKind::Credit, Decimal::ONE, TransactionStatus::Completed, now - Duration::days(2)),
                transaction(2, TransactionKind::Debit, Decimal::ONE, TransactionStatus::Completed, now),
            ])
        });

        let snapshot = WalletManager::new(Arc::new(api)).snapshot().await.unwrap();
        assert_eq!(snapshot.balance(), Decimal::new(12, 0));
        assert_eq!(snapshot.transactions[0].id, 2);
    }

    #[test]
    fn test_summary_counts_completed_only() {
        let now = Utc::now();
        let txs = vec![
            transaction(1, TransactionKind::Credit, Decimal::new(25, 0), TransactionStatus::Completed, now - Duration::days(60)),
            transaction(2, TransactionKind::Debit, Decimal::new(10, 0), TransactionStatus::Completed, now - Duration::days(45)),
            transaction(3, TransactionKind::Debit, Decimal::new(4, 0), TransactionStatus::Completed, now - Duration::days(1)),
            transaction(4, TransactionKind::Credit, Decimal::new(50, 0), TransactionStatus::Pending, now),
            transaction(5, TransactionKind::Debit, Decimal::new(9, 0), TransactionStatus::Failed, now),
        ];

        let summary = WalletSummary::from_transactions(&txs, now);
        assert_eq!(summary.total_top_ups, Decimal::new(25, 0));
        assert_eq!(summary.total_spent, Decimal::new(14, 0));
        assert_eq!(summary.spent_last_30_days, Decimal::new(4, 0));
        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.ledger_balance(Decimal::ZERO), Decimal::new(11, 0));
    }
}
