//! Dashboard overview: headline counters and live activity

use rust_decimal::Decimal;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::core::analytics::ratio;
use crate::core::client::GatewayApi;
use crate::core::error::ClientError;
use crate::core::models::{Direction, Message, MessageStatus, Sim};
use crate::utils::constants::{LIVE_SERIES_LEN, RECENT_MESSAGES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewPart {
    Wallet,
    Sims,
    Messages,
}

impl fmt::Display for OverviewPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverviewPart::Wallet => write!(f, "wallet"),
            OverviewPart::Sims => write!(f, "SIMs"),
            OverviewPart::Messages => write!(f, "messages"),
        }
    }
}

/// Whatever could be fetched; a failed part is left empty
#[derive(Debug, Clone, Default)]
pub struct Overview {
    pub balance: Option<Decimal>,
    pub sims: Vec<Sim>,
    pub messages: Vec<Message>,
    pub failed: Vec<OverviewPart>,
    pub unauthorized: bool,
}

impl Overview {
    /// Fetch wallet, SIMs and messages concurrently
    pub async fn fetch(api: Arc<dyn GatewayApi>) -> Self {
        let (wallet, sims, messages) =
            tokio::join!(api.get_wallet(), api.list_sims(), api.list_messages());

        let mut overview = Overview::default();

        match wallet {
            Ok(wallet) => overview.balance = Some(wallet.balance),
            Err(e) => overview.record_failure(OverviewPart::Wallet, e),
        }
        match sims {
            Ok(sims) => overview.sims = sims,
            Err(e) => overview.record_failure(OverviewPart::Sims, e),
        }
        match messages {
            Ok(mut messages) => {
                messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                overview.messages = messages;
            }
            Err(e) => overview.record_failure(OverviewPart::Messages, e),
        }

        overview
    }

    fn record_failure(&mut self, part: OverviewPart, error: ClientError) {
        tracing::warn!("failed to fetch {} for overview: {}", part, error);
        self.unauthorized |= error.is_unauthorized();
        self.failed.push(part);
    }

    pub fn stats(&self) -> OverviewStats {
        OverviewStats::compute(self.balance, &self.sims, &self.messages)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverviewStats {
    pub messages_sent: usize,
    pub messages_received: usize,
    pub active_sims: usize,
    pub total_sims: usize,
    pub balance: Option<Decimal>,
    /// Delivered over all outbound messages
    pub delivery_rate: f64,
    pub recent: Vec<Message>,
}

impl OverviewStats {
    pub fn compute(balance: Option<Decimal>, sims: &[Sim], messages: &[Message]) -> Self {
        let sent = messages
            .iter()
            .filter(|m| m.direction == Direction::Outbound)
            .count();
        let delivered = messages
            .iter()
            .filter(|m| m.direction == Direction::Outbound && m.status == MessageStatus::Delivered)
            .count();

        let mut recent: Vec<Message> = messages.to_vec();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(RECENT_MESSAGES);

        Self {
            messages_sent: sent,
            messages_received: messages.len() - sent,
            active_sims: sims.iter().filter(|s| s.is_active).count(),
            total_sims: sims.len(),
            balance,
            delivery_rate: ratio(delivered, sent),
            recent,
        }
    }
}

/// Rolling count of messages that appeared between samples
#[derive(Debug, Clone, Default)]
pub struct LiveSeries {
    samples: VecDeque<u64>,
    seen: HashSet<i64>,
    primed: bool,
}

impl LiveSeries {
    /// Record one sample; the first call only learns the existing ids
    pub fn record(&mut self, messages: &[Message]) {
        let new = messages.iter().filter(|m| self.seen.insert(m.id)).count() as u64;
        let sample = if self.primed { new } else { 0 };
        self.primed = true;

        if self.samples.len() == LIVE_SERIES_LEN {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn samples(&self) -> Vec<u64> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::MockGatewayApi;
    use crate::core::testing::{message, outbound, sim};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_parts_fail_independently() {
        let mut api = MockGatewayApi::new();
        api.expect_get_wallet().returning(|| {
            Err(ClientError::Api {
                status: 500,
                detail: "down".to_string(),
            })
        });
        api.expect_list_sims()
            .returning(|| Ok(vec![sim(1, true), sim(2, false)]));
        api.expect_list_messages()
            .returning(|| Ok(vec![outbound(1, MessageStatus::Delivered, "+15550101", Utc::now())]));

        let overview = Overview::fetch(Arc::new(api)).await;
        assert_eq!(overview.failed, vec![OverviewPart::Wallet]);
        assert!(!overview.unauthorized);

        let stats = overview.stats();
        assert_eq!(stats.balance, None);
        assert_eq!(stats.active_sims, 1);
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.delivery_rate, 1.0);
    }

    #[test]
    fn test_stats_recent_and_rates() {
        let now = Utc::now();
        let mut messages: Vec<Message> = (0..7)
            .map(|i| outbound(i, MessageStatus::Sent, "+15550101", now - Duration::minutes(i)))
            .collect();
        messages.push(message(99, Direction::Inbound, MessageStatus::Received, "+15550102", now - Duration::hours(1)));

        let stats = OverviewStats::compute(Some(Decimal::ONE), &[], &messages);
        assert_eq!(stats.messages_sent, 7);
        assert_eq!(stats.messages_received, 1);
        assert_eq!(stats.delivery_rate, 0.0);
        let recent: Vec<i64> = stats.recent.iter().map(|m| m.id).collect();
        assert_eq!(recent, vec![0, 1, 2, 3, 4]);

        let empty = OverviewStats::compute(None, &[], &[]);
        assert_eq!(empty.delivery_rate, 0.0);
        assert!(empty.recent.is_empty());
    }

    #[test]
    fn test_live_series_window() {
        let now = Utc::now();
        let mut series = LiveSeries::default();
        let mut messages = vec![outbound(1, MessageStatus::Sent, "+15550101", now)];

        series.record(&messages);
        messages.push(outbound(2, MessageStatus::Sent, "+15550101", now));
        messages.push(outbound(3, MessageStatus::Sent, "+15550101", now));
        series.record(&messages);
        assert_eq!(series.samples(), vec![0, 2]);

        for _ in 0..40 {
            series.record(&messages);
        }
        assert_eq!(series.len(), LIVE_SERIES_LEN);
        assert!(series.samples().iter().all(|s| *s == 0));
    }
}
