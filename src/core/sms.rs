//! SMS center: listing, sending and daily counters

use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::analytics::ratio;
use crate::core::client::GatewayApi;
use crate::core::error::ClientError;
use crate::core::models::{Direction, Message, MessageStatus, SendSms, Sim};
use crate::utils::constants::{RECIPIENT_MAX_LEN, RECIPIENT_MIN_LEN, SMS_MAX_LEN};

/// Strip spaces and dashes and check the recipient shape
pub fn normalize_recipient(raw: &str) -> Result<String, ClientError> {
    let number: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();

    let digits = number.strip_prefix('+').unwrap_or(&number);
    let valid_chars = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());
    let len = number.chars().count();

    if !valid_chars || !(RECIPIENT_MIN_LEN..=RECIPIENT_MAX_LEN).contains(&len) {
        return Err(ClientError::validation(format!(
            "Recipient must be {}-{} digits with an optional leading +",
            RECIPIENT_MIN_LEN, RECIPIENT_MAX_LEN
        )));
    }

    Ok(number)
}

pub fn validate_content(content: &str) -> Result<(), ClientError> {
    let len = content.chars().count();
    if content.trim().is_empty() {
        return Err(ClientError::validation("Message content is required"));
    }
    if len > SMS_MAX_LEN {
        return Err(ClientError::validation(format!(
            "Message is {} characters, the limit is {}",
            len, SMS_MAX_LEN
        )));
    }
    Ok(())
}

/// The SIM to send from: the requested one, else the first active SIM with quota
pub fn pick_sender(sims: &[Sim], requested: Option<i64>) -> Result<&Sim, ClientError> {
    match requested {
        Some(id) => sims
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ClientError::validation(format!("SIM {} not found", id))),
        None => sims
            .iter()
            .find(|s| s.is_active && s.has_quota())
            .ok_or_else(|| ClientError::validation("No active SIM with remaining quota")),
    }
}

/// Counters shown at the top of the SMS center
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmsStats {
    pub sent_today: usize,
    pub received_today: usize,
    pub pending: usize,
    pub delivery_rate: f64,
}

impl SmsStats {
    /// "Today" is the local calendar date at `offset`
    pub fn from_messages(messages: &[Message], now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let today = now.with_timezone(&offset).date_naive();
        let is_today = |m: &&Message| m.created_at.with_timezone(&offset).date_naive() == today;

        let outbound: Vec<&Message> = messages
            .iter()
            .filter(|m| m.direction == Direction::Outbound)
            .collect();
        let delivered = outbound
            .iter()
            .filter(|m| m.status == MessageStatus::Delivered)
            .count();

        Self {
            sent_today: outbound.iter().copied().filter(is_today).count(),
            received_today: messages
                .iter()
                .filter(|m| m.direction == Direction::Inbound)
                .filter(is_today)
                .count(),
            pending: messages
                .iter()
                .filter(|m| m.status == MessageStatus::Pending)
                .count(),
            delivery_rate: ratio(delivered, outbound.len()),
        }
    }
}

#[derive(Clone)]
pub struct SmsCenter {
    api: Arc<dyn GatewayApi>,
}

impl SmsCenter {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        Self { api }
    }

    /// All messages, newest first
    pub async fn list(&self) -> Result<Vec<Message>, ClientError> {
        let mut messages = self.api.list_messages().await?;
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }

    pub async fn get(&self, id: i64) -> Result<Message, ClientError> {
        self.api.get_message(id).await
    }

    /// Validate locally, then send from the given SIM
    pub async fn send(&self, sim_id: i64, recipient: &str, content: &str) -> Result<Vec<Message>, ClientError> {
        let recipient_number = normalize_recipient(recipient)?;
        validate_content(content)?;

        let request = SendSms {
            sim_ids: vec![sim_id],
            recipient_number,
            content: content.to_string(),
        };
        let sent = self.api.send_sms(&request).await?;
        tracing::info!(sim = sim_id, count = sent.len(), "sent SMS");
        Ok(sent)
    }

    /// Send, picking the sender SIM when none is given
    pub async fn send_auto(
        &self,
        requested_sim: Option<i64>,
        recipient: &str,
        content: &str,
    ) -> Result<Vec<Message>, ClientError> {
        normalize_recipient(recipient)?;
        validate_content(content)?;

        let sims = self.api.list_sims().await?;
        let sender = pick_sender(&sims, requested_sim)?;
        self.send(sender.id, recipient, content).await
    }
}

/// Remembers which message ids were already reported by `watch`
#[derive(Debug, Default)]
pub struct SeenMessages {
    ids: HashSet<i64>,
    primed: bool,
}

impl SeenMessages {
    /// Messages not seen before, oldest first; the first batch only primes
    pub fn fresh<'a>(&mut self, messages: &'a [Message]) -> Vec<&'a Message> {
        let mut fresh: Vec<&Message> = messages
            .iter()
            .filter(|m| self.ids.insert(m.id))
            .collect();

        if !self.primed {
            self.primed = true;
            return Vec::new();
        }

        fresh.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        fresh
    }
}

/// Report fresh messages from a poll feed until `stop` resolves or the feed closes
///
/// `stop` is created once and polled on every iteration, so a one-shot signal
/// such as Ctrl+C is never dropped between batches. An expired session ends the
/// watch; other errors go to `on_error` and polling continues.
pub async fn watch_feed<S, F, E>(
    updates: &mut UnboundedReceiver<Result<Vec<Message>, ClientError>>,
    stop: S,
    mut on_fresh: F,
    mut on_error: E,
) -> Result<(), ClientError>
where
    S: Future,
    F: FnMut(&Message),
    E: FnMut(&ClientError),
{
    tokio::pin!(stop);
    let mut seen = SeenMessages::default();

    loop {
        tokio::select! {
            _ = &mut stop => return Ok(()),
            update = updates.recv() => match update {
                Some(Ok(messages)) => {
                    for message in seen.fresh(&messages) {
                        on_fresh(message);
                    }
                }
                Some(Err(ClientError::Unauthorized)) => return Err(ClientError::Unauthorized),
                Some(Err(e)) => on_error(&e),
                None => return Ok(()),
            },
        }
    }
}
