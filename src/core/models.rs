//! Records exchanged with the SMS gateway backend
//!
//! Field names follow the backend's snake_case JSON. Timestamps may come back
//! with or without an offset; naive values are treated as UTC.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default monthly message allowance shown when the backend omits the counter
pub const DEFAULT_MESSAGES_LIMIT: u32 = 1000;

pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    /// Parse RFC 3339 or a naive ISO-8601 timestamp (assumed UTC)
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw))),
                None => Ok(None),
            }
        }

        pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }
    }
}

// ============================================================================
// Users & auth
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    /// Name to greet the user with
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.email)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: User,
}

// ============================================================================
// SIM cards
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimStatus {
    Active,
    Inactive,
    Suspended,
    Expired,
}

impl std::fmt::Display for SimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimStatus::Active => write!(f, "active"),
            SimStatus::Inactive => write!(f, "inactive"),
            SimStatus::Suspended => write!(f, "suspended"),
            SimStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sim {
    pub id: i64,
    pub iccid: String,
    pub phone_number: String,
    pub status: SimStatus,
    pub is_active: bool,
    #[serde(default)]
    pub data_plan: Option<String>,
    #[serde(with = "timestamp")]
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub messages_used: Option<u32>,
    #[serde(default)]
    pub messages_limit: Option<u32>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Sim {
    /// Messages used so far; the backend may not report it
    pub fn messages_used(&self) -> u32 {
        self.messages_used.unwrap_or(0)
    }

    /// Message allowance, falling back to the client default when absent or zero
    pub fn messages_limit(&self) -> u32 {
        match self.messages_limit {
            Some(limit) if limit > 0 => limit,
            _ => DEFAULT_MESSAGES_LIMIT,
        }
    }

    pub fn has_quota(&self) -> bool {
        self.messages_used() < self.messages_limit()
    }

    /// Whole days until expiry, negative once expired
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.expiry_date.signed_duration_since(now).num_days()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSim {
    pub iccid: String,
    pub phone_number: String,
    pub data_plan: String,
    #[serde(with = "timestamp")]
    pub expiry_date: DateTime<Utc>,
    #[serde(skip)]
    pub idempotency_key: Option<String>,
}

/// Partial update; unset fields are left out of the PATCH body
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SimStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_limit: Option<u32>,
}

// ============================================================================
// SMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Received,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Delivered => write!(f, "delivered"),
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::Received => write!(f, "received"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Charge attached to an outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedTransaction {
    pub id: i64,
    pub amount: Decimal,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub sim_id: Option<i64>,
    #[serde(default)]
    pub transaction_id: Option<i64>,
    #[serde(default)]
    pub sender_number: String,
    #[serde(default)]
    pub recipient_number: String,
    pub content: String,
    pub status: MessageStatus,
    pub direction: Direction,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction: Option<LinkedTransaction>,
}

impl Message {
    /// The number on the other end of the conversation
    pub fn counterpart(&self) -> &str {
        match self.direction {
            Direction::Outbound => &self.recipient_number,
            Direction::Inbound => &self.sender_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendSms {
    /// One message is sent (and charged) per SIM
    pub sim_ids: Vec<i64>,
    pub recipient_number: String,
    pub content: String,
}

/// `/sms/send` answers with one record or a list depending on backend version
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

// ============================================================================
// Wallet
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Credit => write!(f, "credit"),
            TransactionKind::Debit => write!(f, "debit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(default)]
    pub wallet_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    pub status: TransactionStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// Amount with the sign it has on the balance
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => -self.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: String,
    /// Sent as the `Idempotency-Key` header, never in the body
    #[serde(skip)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub balance: Decimal,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// API keys
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    pub name: String,
    pub key: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_naive_timestamp_is_utc() {
        let parsed = timestamp::parse("2025-06-12T07:44:36.123456").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-06-12T07:44:36.123456+00:00");

        let offset = timestamp::parse("2025-06-12T09:44:36+02:00").unwrap();
        assert_eq!(offset, timestamp::parse("2025-06-12T07:44:36").unwrap());

        assert!(timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn test_message_from_backend_json() {
        let msg: Message = serde_json::from_value(json!({
            "id": 7,
            "user_id": 1,
            "sim_id": 2,
            "transaction_id": null,
            "recipient_number": "+447700900123",
            "sender_number": "+15550199",
            "content": "hello",
            "status": "delivered",
            "direction": "outbound",
            "error_message": null,
            "created_at": "2025-06-12T07:44:36",
            "updated_at": null
        }))
        .unwrap();

        assert_eq!(msg.status, MessageStatus::Delivered);
        assert_eq!(msg.direction, Direction::Outbound);
        assert_eq!(msg.counterpart(), "+447700900123");
        assert!(msg.updated_at.is_none());
    }

    #[test]
    fn test_decimal_amount_as_string_or_number() {
        let tx: Transaction = serde_json::from_value(json!({
            "id": 1, "type": "credit", "amount": "25.00", "description": "Wallet top-up",
            "status": "completed", "created_at": "2025-06-12T07:44:36Z"
        }))
        .unwrap();
        assert_eq!(tx.amount, Decimal::new(2500, 2));

        let tx: Transaction = serde_json::from_value(json!({
            "id": 2, "type": "debit", "amount": 10, "description": "SIM",
            "status": "pending", "created_at": "2025-06-12T07:44:36Z"
        }))
        .unwrap();
        assert_eq!(tx.signed_amount(), Decimal::new(-10, 0));
        assert!(!tx.is_completed());
    }

    #[test]
    fn test_new_transaction_keeps_key_out_of_body() {
        let body = serde_json::to_value(NewTransaction {
            kind: TransactionKind::Debit,
            amount: Decimal::new(2500, 2),
            description: "SIM purchase".to_string(),
            idempotency_key: Some("abc".to_string()),
        })
        .unwrap();

        assert_eq!(body["type"], "debit");
        assert!(body.get("idempotency_key").is_none());
    }

    #[test]
    fn test_sim_usage_defaults() {
        let sim: Sim = serde_json::from_value(json!({
            "id": 3, "iccid": "US-001", "phone_number": "+1-555-0199",
            "status": "active", "is_active": true,
            "expiry_date": "2026-01-01T00:00:00", "messages_limit": 0
        }))
        .unwrap();

        assert_eq!(sim.messages_used(), 0);
        assert_eq!(sim.messages_limit(), DEFAULT_MESSAGES_LIMIT);
        assert!(sim.has_quota());
    }

    #[test]
    fn test_sim_update_skips_unset_fields() {
        let body = serde_json::to_value(SimUpdate {
            is_active: Some(false),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, json!({ "is_active": false }));
    }

    #[test]
    fn test_send_response_one_or_many() {
        let one: OneOrMany<i64> = serde_json::from_value(json!(5)).unwrap();
        let many: OneOrMany<i64> = serde_json::from_value(json!([1, 2])).unwrap();
        assert_eq!(Vec::from(one), vec![5]);
        assert_eq!(Vec::from(many), vec![1, 2]);
    }
}
