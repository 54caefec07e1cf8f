//! Message analytics over a trailing window
//!
//! Everything here is computed in memory from the message list the backend
//! returns; there is no analytics endpoint. The window is half-open on the
//! left: a message counts when `now - window < created_at <= now`.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::core::models::{Message, MessageStatus, TransactionStatus};
use crate::utils::constants::{COUNTRY_PREFIXES, OTHER_COUNTRIES};

const PEAK_HOURS: usize = 3;
const PEAK_LABEL_SPAN: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum TimeWindow {
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl TimeWindow {
    pub fn days(self) -> i64 {
        match self {
            TimeWindow::Week => 7,
            TimeWindow::Month => 30,
            TimeWindow::Quarter => 90,
        }
    }

    pub fn all() -> [TimeWindow; 3] {
        [TimeWindow::Week, TimeWindow::Month, TimeWindow::Quarter]
    }

    /// Cycle to the next window (used by the dashboard's window toggle)
    pub fn next(self) -> Self {
        match self {
            TimeWindow::Week => TimeWindow::Month,
            TimeWindow::Month => TimeWindow::Quarter,
            TimeWindow::Quarter => TimeWindow::Week,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::days(self.days())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7d" | "7" | "week" => Ok(TimeWindow::Week),
            "30d" | "30" | "month" => Ok(TimeWindow::Month),
            "90d" | "90" | "quarter" => Ok(TimeWindow::Quarter),
            other => {
                let known: Vec<String> = TimeWindow::all().iter().map(ToString::to_string).collect();
                Err(format!("unknown window '{}', expected one of {}", other, known.join(", ")))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrefixTableError {
    #[error("invalid dialing prefix '{0}'")]
    Invalid(String),
    #[error("duplicate dialing prefix '{0}'")]
    Duplicate(String),
    #[error("dialing prefix '{shorter}' overlaps '{longer}'")]
    Overlap { shorter: String, longer: String },
}

/// Dialing prefix → country bucket, with no prefix shadowing another
#[derive(Debug, Clone)]
pub struct PrefixTable {
    entries: Vec<(String, String)>,
}

impl PrefixTable {
    pub fn new<I, P, C>(entries: I) -> Result<Self, PrefixTableError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let mut table: Vec<(String, String)> = Vec::new();

        for (prefix, country) in entries {
            let prefix = prefix.into();
            let digits = prefix.strip_prefix('+').unwrap_or("");
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(PrefixTableError::Invalid(prefix));
            }

            for (existing, _) in &table {
                if *existing == prefix {
                    return Err(PrefixTableError::Duplicate(prefix));
                }
                if prefix.starts_with(existing.as_str()) {
                    return Err(PrefixTableError::Overlap {
                        shorter: existing.clone(),
                        longer: prefix,
                    });
                }
                if existing.starts_with(prefix.as_str()) {
                    return Err(PrefixTableError::Overlap {
                        shorter: prefix,
                        longer: existing.clone(),
                    });
                }
            }

            table.push((prefix, country.into()));
        }

        Ok(Self { entries: table })
    }

    /// The built-in table with a single NANP bucket for `+1`
    pub fn standard() -> Self {
        Self {
            entries: COUNTRY_PREFIXES
                .iter()
                .map(|(prefix, country)| (prefix.to_string(), country.to_string()))
                .collect(),
        }
    }

    /// Country bucket for a phone number; unmatched numbers land in "Others"
    ///
    /// Separators are ignored and an international `00` is read as `+`.
    /// Since prefixes never overlap, at most one entry can match.
    pub fn country_of(&self, number: &str) -> &str {
        let normalized = normalize_number(number);

        self.entries
            .iter()
            .find(|(prefix, _)| normalized.starts_with(prefix.as_str()))
            .map(|(_, country)| country.as_str())
            .unwrap_or(OTHER_COUNTRIES)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PrefixTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn normalize_number(number: &str) -> String {
    let compact: String = number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    match compact.strip_prefix("00") {
        Some(rest) => format!("+{}", rest),
        None => compact,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    /// Local calendar date on which the bucket ends
    pub date: NaiveDate,
    pub count: usize,
    /// Charges linked to the bucket's messages
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryShare {
    pub country: String,
    pub messages: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakHour {
    pub hour: u32,
    pub label: String,
    pub messages: usize,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub window: TimeWindow,
    pub total: usize,
    pub delivered: usize,
    pub pending: usize,
    pub failed: usize,
    pub other: usize,
    pub delivery_rate: f64,
    pub pending_rate: f64,
    pub failure_rate: f64,
    pub daily: Vec<DayBucket>,
    pub countries: Vec<CountryShare>,
    pub peak_hours: Vec<PeakHour>,
    pub revenue: Decimal,
    pub active_users: usize,
    pub country_count: usize,
}

/// Amount the message was billed, unless the charge failed
fn charge(message: &Message) -> Option<Decimal> {
    message
        .transaction
        .as_ref()
        .filter(|tx| tx.status != Some(TransactionStatus::Failed))
        .map(|tx| tx.amount)
}

/// `part / total`, or 0 when there is nothing to divide by
pub fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

impl AnalyticsReport {
    pub fn compute(
        messages: &[Message],
        window: TimeWindow,
        now: DateTime<Utc>,
        offset: FixedOffset,
        prefixes: &PrefixTable,
    ) -> Self {
        let start = now - window.duration();
        let in_window: Vec<&Message> = messages
            .iter()
            .filter(|m| m.created_at > start && m.created_at <= now)
            .collect();
        let total = in_window.len();

        let count_status = |status: MessageStatus| in_window.iter().filter(|m| m.status == status).count();
        let delivered = count_status(MessageStatus::Delivered);
        let pending = count_status(MessageStatus::Pending);
        let failed = count_status(MessageStatus::Failed);

        let revenue: Decimal = in_window.iter().filter_map(|m| charge(m)).sum();

        let active_users = in_window
            .iter()
            .filter_map(|m| m.user_id)
            .collect::<HashSet<_>>()
            .len();

        let countries = country_breakdown(&in_window, prefixes);
        let country_count = countries
            .iter()
            .filter(|c| c.country != OTHER_COUNTRIES)
            .count();

        Self {
            window,
            total,
            delivered,
            pending,
            failed,
            other: total - delivered - pending - failed,
            delivery_rate: ratio(delivered, total),
            pending_rate: ratio(pending, total),
            failure_rate: ratio(failed, total),
            daily: day_buckets(&in_window, window, now, offset),
            countries,
            peak_hours: peak_hours(&in_window, offset),
            revenue,
            active_users,
            country_count,
        }
    }
}

/// One bucket per day of the window, oldest first
///
/// Buckets are rolling 24 hour spans ending at `now`, so every message in the
/// window falls into exactly one of them.
fn day_buckets(
    messages: &[&Message],
    window: TimeWindow,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<DayBucket> {
    let days = window.days();
    let start = now - window.duration();
    let day_ms = Duration::days(1).num_milliseconds();

    let mut buckets: Vec<DayBucket> = (0..days)
        .map(|i| DayBucket {
            date: (start + Duration::days(i + 1)).with_timezone(&offset).date_naive(),
            count: 0,
            revenue: Decimal::ZERO,
        })
        .collect();

    for message in messages {
        let elapsed = (message.created_at - start).num_milliseconds();
        let index = ((elapsed - 1).max(0) / day_ms).clamp(0, days - 1);
        let bucket = &mut buckets[index as usize];
        bucket.count += 1;
        if let Some(amount) = charge(message) {
            bucket.revenue += amount;
        }
    }

    buckets
}

fn country_breakdown(messages: &[&Message], prefixes: &PrefixTable) -> Vec<CountryShare> {
    let total = messages.len();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for message in messages {
        *counts.entry(prefixes.country_of(message.counterpart())).or_default() += 1;
    }

    let mut rows: Vec<CountryShare> = counts
        .into_iter()
        .map(|(country, messages)| CountryShare {
            country: country.to_string(),
            messages,
            percentage: ratio(messages, total) * 100.0,
        })
        .collect();

    // busiest first, "Others" always last
    rows.sort_by(|a, b| {
        (a.country == OTHER_COUNTRIES)
            .cmp(&(b.country == OTHER_COUNTRIES))
            .then(b.messages.cmp(&a.messages))
            .then(a.country.cmp(&b.country))
    });
    rows
}

fn peak_hours(messages: &[&Message], offset: FixedOffset) -> Vec<PeakHour> {
    let total = messages.len();
    let mut by_hour: BTreeMap<u32, usize> = BTreeMap::new();
    for message in messages {
        let hour = message.created_at.with_timezone(&offset).hour();
        *by_hour.entry(hour).or_default() += 1;
    }

    let mut hours: Vec<(u32, usize)> = by_hour.into_iter().collect();
    hours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    hours
        .into_iter()
        .take(PEAK_HOURS)
        .map(|(hour, messages)| PeakHour {
            hour,
            label: format!("{:02}:00 - {:02}:00", hour, (hour + PEAK_LABEL_SPAN) % 24),
            messages,
            share: ratio(messages, total),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Direction, LinkedTransaction};
    use crate::core::testing::{message, outbound};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 12, 12, 0, 0).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn report(messages: &[Message], window: TimeWindow) -> AnalyticsReport {
        AnalyticsReport::compute(messages, window, now(), utc(), &PrefixTable::standard())
    }

    #[test]
    fn test_standard_table_is_valid() {
        let table = PrefixTable::new(COUNTRY_PREFIXES.iter().copied()).unwrap();
        assert_eq!(table.len(), COUNTRY_PREFIXES.len());
    }

    #[test]
    fn test_prefix_table_rejects_overlap() {
        assert_eq!(
            PrefixTable::new([("+44", "UK"), ("+44", "Also UK")]).unwrap_err(),
            PrefixTableError::Duplicate("+44".to_string())
        );
        assert_eq!(
            PrefixTable::new([("+1", "NANP"), ("+1242", "Bahamas")]).unwrap_err(),
            PrefixTableError::Overlap {
                shorter: "+1".to_string(),
                longer: "+1242".to_string()
            }
        );
        assert_eq!(
            PrefixTable::new([("+1242", "Bahamas"), ("+1", "NANP")]).unwrap_err(),
            PrefixTableError::Overlap {
                shorter: "+1".to_string(),
                longer: "+1242".to_string()
            }
        );
        assert!(matches!(
            PrefixTable::new([("44", "UK")]),
            Err(PrefixTableError::Invalid(_))
        ));
    }

    #[test]
    fn test_country_lookup() {
        let table = PrefixTable::standard();
        assert_eq!(table.country_of("+1-555-0199"), "US/Canada (NANP)");
        assert_eq!(table.country_of("+1 416 555 0100"), "US/Canada (NANP)");
        assert_eq!(table.country_of("+44 20 7946 0999"), "United Kingdom");
        assert_eq!(table.country_of("0049 30 12345999"), "Germany");
        assert_eq!(table.country_of("+971 4 000 0000"), "United Arab Emirates");
        assert_eq!(table.country_of("+999123"), OTHER_COUNTRIES);
        assert_eq!(table.country_of("5550199"), OTHER_COUNTRIES);
    }

    #[test]
    fn test_empty_window_has_zero_rates() {
        let r = report(&[], TimeWindow::Week);
        assert_eq!(r.total, 0);
        assert_eq!(r.delivery_rate, 0.0);
        assert_eq!(r.pending_rate, 0.0);
        assert_eq!(r.failure_rate, 0.0);
        assert!(!r.delivery_rate.is_nan());
        assert_eq!(r.daily.len(), 7);
        assert!(r.daily.iter().all(|b| b.count == 0));
        assert!(r.countries.is_empty());
        assert!(r.peak_hours.is_empty());
        assert_eq!(r.revenue, Decimal::ZERO);
    }

    #[test]
    fn test_status_rates() {
        let t = now() - Duration::hours(1);
        let messages = vec![
            outbound(1, MessageStatus::Delivered, "+15550101", t),
            outbound(2, MessageStatus::Delivered, "+15550102", t),
            outbound(3, MessageStatus::Failed, "+15550103", t),
            outbound(4, MessageStatus::Pending, "+15550104", t),
            message(5, Direction::Inbound, MessageStatus::Received, "+15550105", t),
        ];

        let r = report(&messages, TimeWindow::Week);
        assert_eq!(r.total, 5);
        assert_eq!((r.delivered, r.pending, r.failed, r.other), (2, 1, 1, 1));
        assert!((r.delivery_rate - 0.4).abs() < 1e-9);
        assert!((r.failure_rate - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_week_buckets_cover_window() {
        let messages = vec![
            // exactly on the left edge, excluded
            outbound(1, MessageStatus::Sent, "+15550101", now() - Duration::days(7)),
            outbound(2, MessageStatus::Sent, "+15550101", now() - Duration::days(7) + Duration::seconds(1)),
            outbound(3, MessageStatus::Sent, "+15550101", now() - Duration::days(3)),
            outbound(4, MessageStatus::Sent, "+15550101", now() - Duration::minutes(5)),
            // exactly now, included
            outbound(5, MessageStatus::Sent, "+15550101", now()),
            // in the future, excluded
            outbound(6, MessageStatus::Sent, "+15550101", now() + Duration::minutes(5)),
            outbound(7, MessageStatus::Sent, "+15550101", now() - Duration::days(40)),
        ];

        let r = report(&messages, TimeWindow::Week);
        assert_eq!(r.total, 4);
        assert_eq!(r.daily.len(), 7);
        assert_eq!(r.daily.iter().map(|b| b.count).sum::<usize>(), r.total);
        assert_eq!(r.daily[0].count, 1);
        assert_eq!(r.daily[3].count, 1);
        assert_eq!(r.daily[6].count, 2);

        for pair in r.daily.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
        assert_eq!(r.daily[6].date, now().date_naive());

        let r = report(&messages, TimeWindow::Quarter);
        assert_eq!(r.daily.len(), 90);
        assert_eq!(r.total, 6);
        assert_eq!(r.daily.iter().map(|b| b.count).sum::<usize>(), 6);
    }

    #[test]
    fn test_country_percentages_sum_to_100() {
        let t = now() - Duration::hours(2);
        let messages = vec![
            outbound(1, MessageStatus::Delivered, "+1-555-0101", t),
            outbound(2, MessageStatus::Delivered, "+1 416 555 0100", t),
            outbound(3, MessageStatus::Delivered, "+44 7700 900123", t),
            outbound(4, MessageStatus::Delivered, "+49 30 1234", t),
            outbound(5, MessageStatus::Delivered, "+999 1234", t),
            message(6, Direction::Inbound, MessageStatus::Received, "+81 3 1234 5999", t),
        ];

        let r = report(&messages, TimeWindow::Week);
        assert_eq!(r.countries.iter().map(|c| c.messages).sum::<usize>(), r.total);
        let pct: f64 = r.countries.iter().map(|c| c.percentage).sum();
        assert!((pct - 100.0).abs() < 0.01);

        assert_eq!(r.countries[0].country, "US/Canada (NANP)");
        assert_eq!(r.countries[0].messages, 2);
        assert_eq!(r.countries.last().unwrap().country, OTHER_COUNTRIES);
        assert_eq!(r.country_count, 4);
    }

    #[test]
    fn test_peak_hours_prefer_earlier_on_tie() {
        let at = |h: u32| Utc.with_ymd_and_hms(2025, 6, 11, h, 15, 0).unwrap();
        let messages = vec![
            outbound(1, MessageStatus::Sent, "+15550101", at(14)),
            outbound(2, MessageStatus::Sent, "+15550101", at(14)),
            outbound(3, MessageStatus::Sent, "+15550101", at(9)),
            outbound(4, MessageStatus::Sent, "+15550101", at(22)),
            outbound(5, MessageStatus::Sent, "+15550101", at(3)),
        ];

        let r = report(&messages, TimeWindow::Week);
        let hours: Vec<u32> = r.peak_hours.iter().map(|p| p.hour).collect();
        assert_eq!(hours, vec![14, 3, 9]);
        assert_eq!(r.peak_hours[0].label, "14:00 - 17:00");
        assert!((r.peak_hours[0].share - 0.4).abs() < 1e-9);

        // local offset shifts the hour and wraps the label
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let r = AnalyticsReport::compute(&messages, TimeWindow::Week, now(), offset, &PrefixTable::standard());
        let hours: Vec<u32> = r.peak_hours.iter().map(|p| p.hour).collect();
        assert_eq!(hours, vec![16, 0, 5]);
        assert_eq!(r.peak_hours[1].label, "00:00 - 03:00");

        let wrapped = AnalyticsReport::compute(&messages[3..4], TimeWindow::Week, now(), utc(), &PrefixTable::standard());
        assert_eq!(wrapped.peak_hours[0].label, "22:00 - 01:00");
    }

    #[test]
    fn test_revenue_and_users() {
        let t = now() - Duration::hours(3);
        let mut paid = outbound(1, MessageStatus::Delivered, "+15550101", t);
        paid.transaction = Some(LinkedTransaction {
            id: 1,
            amount: Decimal::new(5, 2),
            status: Some(TransactionStatus::Completed),
        });
        let mut refunded = outbound(2, MessageStatus::Failed, "+15550101", t);
        refunded.transaction = Some(LinkedTransaction {
            id: 2,
            amount: Decimal::new(5, 2),
            status: Some(TransactionStatus::Failed),
        });
        refunded.user_id = Some(2);

        let r = report(&[paid, refunded], TimeWindow::Week);
        assert_eq!(r.revenue, Decimal::new(5, 2));
        assert_eq!(r.active_users, 2);
    }

    #[test]
    fn test_daily_revenue_series() {
        let charged = |id: i64, hours_ago: i64, cents: i64, status: TransactionStatus| {
            let mut m = outbound(id, MessageStatus::Delivered, "+15550101", now() - Duration::hours(hours_ago));
            m.transaction = Some(LinkedTransaction {
                id,
                amount: Decimal::new(cents, 2),
                status: Some(status),
            });
            m
        };
        let messages = vec![
            charged(1, 1, 5, TransactionStatus::Completed),
            charged(2, 2, 7, TransactionStatus::Completed),
            charged(3, 30, 5, TransactionStatus::Completed),
            charged(4, 3, 9, TransactionStatus::Failed),
            outbound(5, MessageStatus::Pending, "+15550101", now() - Duration::hours(4)),
        ];

        let r = report(&messages, TimeWindow::Week);
        assert_eq!(r.daily[6].revenue, Decimal::new(12, 2));
        assert_eq!(r.daily[6].count, 4);
        assert_eq!(r.daily[5].revenue, Decimal::new(5, 2));
        assert!(r.daily[..5].iter().all(|b| b.revenue == Decimal::ZERO));
        assert_eq!(r.daily.iter().map(|b| b.revenue).sum::<Decimal>(), r.revenue);
    }

    #[test]
    fn test_window_parse() {
        assert_eq!("7d".parse::<TimeWindow>().unwrap(), TimeWindow::Week);
        assert_eq!("30D".parse::<TimeWindow>().unwrap(), TimeWindow::Month);
        assert_eq!("90d".parse::<TimeWindow>().unwrap(), TimeWindow::Quarter);
        let err = "1y".parse::<TimeWindow>().unwrap_err();
        assert!(err.ends_with("expected one of 7d, 30d, 90d"), "{}", err);
        assert_eq!(TimeWindow::Quarter.next(), TimeWindow::Week);
        assert_eq!(TimeWindow::Month.to_string(), "30d");
    }
}
