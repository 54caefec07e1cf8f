//! SIM inventory, marketplace purchases and activation state

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::core::client::GatewayApi;
use crate::core::error::ClientError;
use crate::core::models::{NewSim, Sim, SimStatus, SimUpdate, Transaction, TransactionKind};
use crate::core::wallet::WalletManager;
use crate::utils::constants::{SimOffer, SIM_MONTHLY_COST, SIM_VALIDITY_DAYS};

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("insufficient wallet balance: {price} needed, {balance} available")]
    InsufficientBalance { price: Decimal, balance: Decimal },

    /// The debit was not recorded, nothing to undo
    #[error("payment failed: {0}")]
    Payment(#[source] ClientError),

    /// The debit went through but the SIM was not created
    #[error("SIM provisioning failed after payment ({source}); refund {}", refund_state(.refunded))]
    Provisioning {
        source: ClientError,
        refunded: bool,
        refund_error: Option<ClientError>,
    },
}

fn refund_state(refunded: &bool) -> &'static str {
    if *refunded {
        "issued"
    } else {
        "failed, contact support"
    }
}

impl PurchaseError {
    pub fn is_unauthorized(&self) -> bool {
        match self {
            PurchaseError::Payment(e) => e.is_unauthorized(),
            PurchaseError::Provisioning { source, .. } => source.is_unauthorized(),
            PurchaseError::InsufficientBalance { .. } => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PurchaseError::InsufficientBalance { .. } => "Insufficient wallet balance".to_string(),
            PurchaseError::Payment(e) => e.user_message("purchase SIM"),
            PurchaseError::Provisioning { refunded: true, .. } => {
                "SIM provisioning failed, payment refunded".to_string()
            }
            PurchaseError::Provisioning { refunded: false, .. } => {
                "SIM provisioning failed and the refund did not go through".to_string()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Purchase {
    pub sim: Sim,
    pub debit: Transaction,
    /// Balance after the purchase, when it could be re-read
    pub balance: Option<Decimal>,
}

/// Inventory counters shown above the SIM list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStats {
    pub total: usize,
    pub active: usize,
    pub messages_used: u64,
    pub messages_limit: u64,
    pub monthly_cost: Decimal,
    /// Soonest expiry among active SIMs, in whole days
    pub next_expiry_days: Option<i64>,
}

impl SimStats {
    pub fn from_sims(sims: &[Sim], now: DateTime<Utc>) -> Self {
        Self {
            total: sims.len(),
            active: sims.iter().filter(|s| s.is_active).count(),
            messages_used: sims.iter().map(|s| s.messages_used() as u64).sum(),
            messages_limit: sims.iter().map(|s| s.messages_limit() as u64).sum(),
            monthly_cost: Decimal::from(SIM_MONTHLY_COST) * Decimal::from(sims.len()),
            next_expiry_days: sims
                .iter()
                .filter(|s| s.is_active)
                .map(|s| s.days_until_expiry(now))
                .min(),
        }
    }
}

/// The update that flips a SIM's active flag and keeps status in step
pub fn toggle_update(sim: &Sim) -> SimUpdate {
    let activate = !sim.is_active;
    SimUpdate {
        is_active: Some(activate),
        status: Some(if activate {
            SimStatus::Active
        } else {
            SimStatus::Inactive
        }),
        ..Default::default()
    }
}

/// A row in the SIM list: either waiting on the backend or backed by it
#[derive(Debug, Clone, PartialEq)]
pub enum SimEntry {
    Pending { local_ref: Uuid, offer_id: String, phone_number: String },
    Confirmed(Sim),
}

impl SimEntry {
    pub fn phone_number(&self) -> &str {
        match self {
            SimEntry::Pending { phone_number, .. } => phone_number,
            SimEntry::Confirmed(sim) => &sim.phone_number,
        }
    }

    fn is_placeholder(&self, local: Uuid) -> bool {
        matches!(self, SimEntry::Pending { local_ref, .. } if *local_ref == local)
    }

    pub fn sim(&self) -> Option<&Sim> {
        match self {
            SimEntry::Confirmed(sim) => Some(sim),
            SimEntry::Pending { .. } => None,
        }
    }
}

/// Local SIM list with optimistic placeholders for in-flight purchases
#[derive(Debug, Clone, Default)]
pub struct SimRoster {
    entries: Vec<SimEntry>,
}

impl SimRoster {
    pub fn entries(&self) -> &[SimEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn confirmed(&self) -> Vec<Sim> {
        self.entries.iter().filter_map(SimEntry::sim).cloned().collect()
    }

    /// Replace the confirmed entries with a fresh server list, keeping placeholders
    pub fn replace(&mut self, sims: Vec<Sim>) {
        self.entries.retain(|e| matches!(e, SimEntry::Pending { .. }));
        let pending = std::mem::take(&mut self.entries);
        self.entries = sims.into_iter().map(SimEntry::Confirmed).collect();
        self.entries.extend(pending);
    }

    pub fn add_pending(&mut self, offer: &SimOffer) -> Uuid {
        let local_ref = Uuid::new_v4();
        self.entries.push(SimEntry::Pending {
            local_ref,
            offer_id: offer.id.to_string(),
            phone_number: offer.number.to_string(),
        });
        local_ref
    }

    /// Swap a placeholder for the SIM the backend created, adopting its id
    pub fn confirm(&mut self, local_ref: Uuid, sim: Sim) {
        // a refresh may already have brought the server copy in
        let server_id = sim.id;
        self.entries
            .retain(|e| !matches!(e, SimEntry::Confirmed(existing) if existing.id == server_id));

        match self.entries.iter().position(|e| e.is_placeholder(local_ref)) {
            Some(index) => self.entries[index] = SimEntry::Confirmed(sim),
            None => self.entries.push(SimEntry::Confirmed(sim)),
        }
    }

    /// Drop a placeholder whose purchase failed
    pub fn discard(&mut self, local_ref: Uuid) {
        self.entries.retain(|e| !e.is_placeholder(local_ref));
    }

    pub fn get(&self, id: i64) -> Option<&Sim> {
        self.entries
            .iter()
            .filter_map(SimEntry::sim)
            .find(|sim| sim.id == id)
    }

    /// Patch a confirmed SIM with the backend's updated record
    pub fn apply(&mut self, updated: Sim) -> bool {
        for entry in &mut self.entries {
            if let SimEntry::Confirmed(sim) = entry {
                if sim.id == updated.id {
                    *sim = updated;
                    return true;
                }
            }
        }
        false
    }

    pub fn remove(&mut self, id: i64) {
        self.entries
            .retain(|e| !matches!(e, SimEntry::Confirmed(sim) if sim.id == id));
    }
}

#[derive(Clone)]
pub struct SimManager {
    api: Arc<dyn GatewayApi>,
    wallet: WalletManager,
}

impl SimManager {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        let wallet = WalletManager::new(Arc::clone(&api));
        Self { api, wallet }
    }

    pub async fn list(&self) -> Result<Vec<Sim>, ClientError> {
        self.api.list_sims().await
    }

    pub async fn get(&self, id: i64) -> Result<Sim, ClientError> {
        self.api.get_sim(id).await
    }

    pub async fn create(&self, request: &NewSim) -> Result<Sim, ClientError> {
        if request.expiry_date <= Utc::now() {
            return Err(ClientError::validation("SIM expiry must be in the future"));
        }
        self.api.create_sim(request).await
    }

    pub async fn activate(&self, id: i64) -> Result<Sim, ClientError> {
        self.api.activate_sim(id).await
    }

    pub async fn deactivate(&self, id: i64) -> Result<Sim, ClientError> {
        self.api.deactivate_sim(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        self.api.delete_sim(id).await
    }

    /// Flip the active flag; callers patch local state only with the result
    pub async fn toggle(&self, sim: &Sim) -> Result<Sim, ClientError> {
        let update = toggle_update(sim);
        let updated = self.api.update_sim(sim.id, &update).await?;
        tracing::info!(sim = sim.id, active = updated.is_active, "toggled SIM");
        Ok(updated)
    }

    /// Pay for a marketplace SIM and provision it
    ///
    /// Both calls carry the same idempotency key. When provisioning fails
    /// after the debit, a compensating credit is posted under a derived key.
    pub async fn purchase(&self, offer: &SimOffer, balance: Decimal) -> Result<Purchase, PurchaseError> {
        let price = offer.price();
        if balance < price {
            return Err(PurchaseError::InsufficientBalance { price, balance });
        }

        let key = Uuid::new_v4().to_string();
        let description = format!("SIM purchase: {} {} ({})", offer.id, offer.country, offer.provider);

        let debit = self
            .wallet
            .post(TransactionKind::Debit, price, &description, Some(key.clone()))
            .await
            .map_err(PurchaseError::Payment)?;

        let request = NewSim {
            iccid: generate_iccid(),
            phone_number: offer.number.to_string(),
            data_plan: offer.data_plan(),
            expiry_date: Utc::now() + Duration::days(SIM_VALIDITY_DAYS),
            idempotency_key: Some(key.clone()),
        };

        match self.api.create_sim(&request).await {
            Ok(sim) => {
                tracing::info!(sim = sim.id, offer = offer.id, "purchased SIM");
                let balance = self.wallet.balance().await.ok();
                Ok(Purchase { sim, debit, balance })
            }
            Err(source) => {
                tracing::warn!(offer = offer.id, "provisioning failed after debit: {}", source);

                let refund = self
                    .wallet
                    .post(
                        TransactionKind::Credit,
                        price,
                        &format!("Refund: {}", description),
                        Some(format!("{}-refund", key)),
                    )
                    .await;

                match &refund {
                    Ok(tx) => tracing::info!(transaction = tx.id, "refunded failed SIM purchase"),
                    Err(e) => tracing::error!(key = %key, "refund for failed SIM purchase did not go through: {}", e),
                }

                Err(PurchaseError::Provisioning {
                    source,
                    refunded: refund.is_ok(),
                    refund_error: refund.err(),
                })
            }
        }
    }
}

/// A 19 digit ICCID with the telecom industry prefix
fn generate_iccid() -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..17).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect();
    format!("89{}", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::MockGatewayApi;
    use crate::core::models::{NewTransaction, TransactionStatus};
    use crate::core::testing::{sim, transaction, wallet};
    use crate::utils::constants::find_offer;
    use std::sync::Mutex;

    #[test]
    fn test_toggle_update_matches_status() {
        let update = toggle_update(&sim(1, true));
        assert_eq!(update.is_active, Some(false));
        assert_eq!(update.status, Some(SimStatus::Inactive));

        let update = toggle_update(&sim(1, false));
        assert_eq!(update.status, Some(SimStatus::Active));
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_status() {
        let mut api = MockGatewayApi::new();
        api.expect_update_sim()
            .times(2)
            .returning(|id: i64, update: &SimUpdate| {
                let mut updated = sim(id, true);
                updated.is_active = update.is_active.unwrap();
                updated.status = update.status.unwrap();
                Ok(updated)
            });

        let manager = SimManager::new(Arc::new(api));
        let original = sim(7, true);

        let once = manager.toggle(&original).await.unwrap();
        assert_eq!(once.status, SimStatus::Inactive);
        let twice = manager.toggle(&once).await.unwrap();
        assert_eq!(twice.status, original.status);
        assert_eq!(twice.is_active, original.is_active);
    }

    #[tokio::test]
    async fn test_failed_toggle_leaves_roster_untouched() {
        let mut api = MockGatewayApi::new();
        api.expect_update_sim().returning(|_, _| {
            Err(ClientError::Api {
                status: 500,
                detail: "boom".to_string(),
            })
        });

        let mut roster = SimRoster::default();
        roster.replace(vec![sim(3, true)]);

        let manager = SimManager::new(Arc::new(api));
        let current = roster.get(3).cloned().unwrap();
        if let Ok(updated) = manager.toggle(&current).await {
            roster.apply(updated);
        }

        assert!(roster.get(3).unwrap().is_active);
    }

    #[test]
    fn test_confirm_adopts_server_id() {
        let offer = find_offer("DE-001").unwrap();
        let mut roster = SimRoster::default();
        roster.replace(vec![sim(1, true)]);

        let local_ref = roster.add_pending(offer);
        assert_eq!(roster.len(), 2);
        assert!(roster.get(42).is_none());

        roster.confirm(local_ref, sim(42, true));
        assert_eq!(roster.len(), 2);
        assert!(roster.get(42).is_some());
        assert!(roster
            .entries()
            .iter()
            .all(|e| matches!(e, SimEntry::Confirmed(_))));
    }

    #[test]
    fn test_confirm_after_refresh_does_not_duplicate() {
        let offer = find_offer("JP-001").unwrap();
        let mut roster = SimRoster::default();
        let local_ref = roster.add_pending(offer);

        // a refresh lands before the purchase response
        roster.replace(vec![sim(1, true), sim(9, true)]);
        assert_eq!(roster.len(), 3);

        roster.confirm(local_ref, sim(9, true));
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.confirmed().len(), 2);
    }

    #[test]
    fn test_discard_and_remove() {
        let offer = find_offer("US-001").unwrap();
        let mut roster = SimRoster::default();
        roster.replace(vec![sim(1, true), sim(2, false)]);
        let local_ref = roster.add_pending(offer);

        roster.discard(local_ref);
        roster.remove(1);
        assert_eq!(roster.len(), 1);
        assert!(roster.get(2).is_some());
    }

    #[test]
    fn test_stats() {
        let now = Utc::now();
        let mut expiring = sim(2, true);
        expiring.expiry_date = now + Duration::days(5) + Duration::hours(1);
        let sims = vec![sim(1, true), expiring, sim(3, false)];

        let stats = SimStats::from_sims(&sims, now);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.messages_used, 30);
        assert_eq!(stats.messages_limit, 3000);
        assert_eq!(stats.monthly_cost, Decimal::new(75, 0));
        assert_eq!(stats.next_expiry_days, Some(5));
    }

    #[tokio::test]
    async fn test_purchase_rejected_on_low_balance() {
        let manager = SimManager::new(Arc::new(MockGatewayApi::new()));
        let offer = find_offer("US-001").unwrap();

        let err = manager.purchase(offer, Decimal::new(10, 0)).await.unwrap_err();
        assert!(matches!(err, PurchaseError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn test_purchase_shares_idempotency_key() {
        let keys = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut api = MockGatewayApi::new();

        let debit_keys = Arc::clone(&keys);
        api.expect_create_transaction()
            .times(1)
            .returning(move |req: &NewTransaction| {
                debit_keys.lock().unwrap().push(req.idempotency_key.clone().unwrap());
                Ok(transaction(1, req.kind, req.amount, TransactionStatus::Completed, Utc::now()))
            });

        let sim_keys = Arc::clone(&keys);
        api.expect_create_sim()
            .times(1)
            .returning(move |req: &NewSim| {
                sim_keys.lock().unwrap().push(req.idempotency_key.clone().unwrap());
                assert!(req.expiry_date > Utc::now() + Duration::days(29));
                assert_eq!(req.iccid.len(), 19);
                Ok(sim(50, true))
            });
        api.expect_get_wallet()
            .returning(|| Ok(wallet(Decimal::new(75, 0))));

        let manager = SimManager::new(Arc::new(api));
        let offer = find_offer("US-001").unwrap();
        let purchase = manager.purchase(offer, Decimal::new(100, 0)).await.unwrap();

        assert_eq!(purchase.sim.id, 50);
        assert_eq!(purchase.balance, Some(Decimal::new(75, 0)));
        let keys = keys.lock().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], keys[1]);
    }

    #[tokio::test]
    async fn test_failed_provisioning_refunds() {
        let posted = Arc::new(Mutex::new(Vec::<NewTransaction>::new()));
        let mut api = MockGatewayApi::new();

        let log = Arc::clone(&posted);
        api.expect_create_transaction()
            .times(2)
            .returning(move |req: &NewTransaction| {
                log.lock().unwrap().push(req.clone());
                Ok(transaction(1, req.kind, req.amount, TransactionStatus::Completed, Utc::now()))
            });
        api.expect_create_sim().times(1).returning(|_| {
            Err(ClientError::Api {
                status: 503,
                detail: "carrier unavailable".to_string(),
            })
        });

        let manager = SimManager::new(Arc::new(api));
        let offer = find_offer("UK-001").unwrap();
        let err = manager.purchase(offer, Decimal::new(100, 0)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::Provisioning { refunded: true, .. }));
        assert_eq!(err.user_message(), "SIM provisioning failed, payment refunded");

        let posted = posted.lock().unwrap();
        assert_eq!(posted[0].kind, TransactionKind::Debit);
        assert_eq!(posted[1].kind, TransactionKind::Credit);
        assert_eq!(posted[1].amount, posted[0].amount);
        assert!(posted[1].description.starts_with("Refund: "));
        assert_ne!(posted[1].idempotency_key, posted[0].idempotency_key);
    }

    #[tokio::test]
    async fn test_create_rejects_past_expiry() {
        let manager = SimManager::new(Arc::new(MockGatewayApi::new()));
        let request = NewSim {
            iccid: "8900000000000000001".to_string(),
            phone_number: "+15550100".to_string(),
            data_plan: "1.0GB".to_string(),
            expiry_date: Utc::now() - Duration::days(1),
            idempotency_key: None,
        };
        assert!(matches!(
            manager.create(&request).await,
            Err(ClientError::Validation(_))
        ));
    }
}
