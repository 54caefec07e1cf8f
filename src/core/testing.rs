//! Record builders shared by the unit tests

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::core::models::{
    Direction, Message, MessageStatus, Sim, SimStatus, Transaction, TransactionKind,
    TransactionStatus, User, Wallet,
};

pub fn user() -> User {
    User {
        id: 1,
        email: "ops@example.com".to_string(),
        username: Some("ops".to_string()),
        name: None,
        is_active: true,
        role: None,
    }
}

pub fn wallet(balance: Decimal) -> Wallet {
    Wallet {
        id: Some(1),
        user_id: Some(1),
        balance,
        updated_at: None,
    }
}

pub fn sim(id: i64, active: bool) -> Sim {
    Sim {
        id,
        iccid: format!("8901000000000000{:03}", id),
        phone_number: format!("+1555010{:04}", id),
        status: if active { SimStatus::Active } else { SimStatus::Inactive },
        is_active: active,
        data_plan: Some("5.0GB".to_string()),
        expiry_date: Utc::now() + Duration::days(30),
        user_id: Some(1),
        messages_used: Some(10),
        messages_limit: Some(1000),
        created_at: None,
        updated_at: None,
    }
}

pub fn message(
    id: i64,
    direction: Direction,
    status: MessageStatus,
    number: &str,
    created_at: DateTime<Utc>,
) -> Message {
    let (sender, recipient) = match direction {
        Direction::Outbound => ("+15550100".to_string(), number.to_string()),
        Direction::Inbound => (number.to_string(), "+15550100".to_string()),
    };

    Message {
        id,
        user_id: Some(1),
        sim_id: Some(1),
        transaction_id: None,
        sender_number: sender,
        recipient_number: recipient,
        content: format!("message {}", id),
        status,
        direction,
        error_message: None,
        created_at,
        updated_at: None,
        transaction: None,
    }
}

pub fn outbound(id: i64, status: MessageStatus, number: &str, created_at: DateTime<Utc>) -> Message {
    message(id, Direction::Outbound, status, number, created_at)
}

pub fn transaction(
    id: i64,
    kind: TransactionKind,
    amount: Decimal,
    status: TransactionStatus,
    created_at: DateTime<Utc>,
) -> Transaction {
    Transaction {
        id,
        wallet_id: Some(1),
        kind,
        amount,
        description: match kind {
            TransactionKind::Credit => "Wallet top-up".to_string(),
            TransactionKind::Debit => "Wallet debit".to_string(),
        },
        status,
        created_at,
    }
}
