/// Analytics view

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::Dashboard;
use crate::core::analytics::AnalyticsReport;
use crate::core::TimeWindow;
use crate::utils::{format_money, format_percent};
use crate::widgets::stat_card::{render_row, StatCard};
use crate::widgets::{ShareList, VolumeChart};

fn label_format(window: TimeWindow) -> &'static str {
    match window {
        TimeWindow::Week => "%a %d",
        TimeWindow::Month | TimeWindow::Quarter => "%d",
    }
}

/// Bar labels: short dates for a week, day of month otherwise
fn day_labels(report: &AnalyticsReport) -> Vec<(String, u64)> {
    let format = label_format(report.window);
    report
        .daily
        .iter()
        .map(|bucket| (bucket.date.format(format).to_string(), bucket.count as u64))
        .collect()
}

/// Daily revenue in whole cents
fn revenue_bars(report: &AnalyticsReport) -> Vec<(String, u64)> {
    let format = label_format(report.window);
    report
        .daily
        .iter()
        .map(|bucket| {
            let cents = (bucket.revenue * Decimal::from(100)).round().to_u64().unwrap_or(0);
            (bucket.date.format(format).to_string(), cents)
        })
        .collect()
}

impl Dashboard {
    pub(super) fn render_analytics(&self, frame: &mut Frame, area: Rect) {
        let Some(report) = &self.analytics else {
            let loading = Paragraph::new("Loading messages...")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL).title("Analytics"));
            frame.render_widget(loading, area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),      // Cards
                Constraint::Percentage(50), // Daily volume
                Constraint::Min(0),         // Breakdowns
            ])
            .split(area);

        render_row(
            frame,
            chunks[0],
            vec![
                StatCard::new("Total Messages", report.total.to_string())
                    .detail(format!("last {}", report.window)),
                StatCard::new("Delivery Rate", format_percent(report.delivery_rate)).accent(Color::Green),
                StatCard::new("Revenue", format_money(report.revenue)).accent(Color::Green),
                StatCard::new("Active Users", report.active_users.to_string()).accent(Color::Magenta),
                StatCard::new("Countries", report.country_count.to_string()).accent(Color::Yellow),
            ],
        );

        let charts = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        let title = format!("Daily volume ({})", report.window);
        frame.render_widget(VolumeChart::new(&title, day_labels(report)), charts[0]);
        frame.render_widget(
            VolumeChart::new("Daily revenue (cents)", revenue_bars(report)).color(Color::Green),
            charts[1],
        );

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[2]);

        let countries = report
            .countries
            .iter()
            .map(|c| (c.country.clone(), c.percentage, c.messages))
            .collect();
        frame.render_widget(ShareList::new("By country", countries), bottom[0]);

        let mut lines = vec![Line::from(Span::styled(
            "Status",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))];
        for (label, count, rate, color) in [
            ("Delivered", report.delivered, report.delivery_rate, Color::Green),
            ("Pending", report.pending, report.pending_rate, Color::Yellow),
            ("Failed", report.failed, report.failure_rate, Color::Red),
        ] {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<10}", label), Style::default().fg(color)),
                Span::raw(format!("{:>6}  {:>6}", count, format_percent(rate))),
            ]));
        }
        if report.other > 0 {
            lines.push(Line::from(format!("  {:<10}{:>6}", "Other", report.other)));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Peak hours",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        if report.peak_hours.is_empty() {
            lines.push(Line::from(Span::styled("  No data", Style::default().fg(Color::DarkGray))));
        }
        for peak in &report.peak_hours {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<15}", peak.label), Style::default().fg(Color::Cyan)),
                Span::raw(format!("{:>6}  {:>6}", peak.messages, format_percent(peak.share))),
            ]));
        }

        let breakdown = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Breakdown"));
        frame.render_widget(breakdown, bottom[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{LinkedTransaction, MessageStatus, TransactionStatus};
    use crate::core::testing::outbound;
    use crate::core::PrefixTable;
    use chrono::{Duration, FixedOffset, TimeZone, Utc};

    #[test]
    fn test_day_labels_match_buckets() {
        let now = Utc.with_ymd_and_hms(2025, 6, 12, 12, 0, 0).unwrap();
        let messages = vec![
            outbound(1, MessageStatus::Delivered, "+15550101", now - Duration::hours(1)),
            outbound(2, MessageStatus::Delivered, "+15550101", now - Duration::hours(2)),
        ];
        let utc = FixedOffset::east_opt(0).unwrap();
        let report = AnalyticsReport::compute(&messages, TimeWindow::Week, now, utc, &PrefixTable::standard());

        let labels = day_labels(&report);
        assert_eq!(labels.len(), 7);
        assert_eq!(labels[6], ("Thu 12".to_string(), 2));
        assert_eq!(labels.iter().map(|(_, v)| v).sum::<u64>(), 2);
    }

    #[test]
    fn test_revenue_bars_in_cents() {
        let now = Utc.with_ymd_and_hms(2025, 6, 12, 12, 0, 0).unwrap();
        let mut paid = outbound(1, MessageStatus::Delivered, "+15550101", now - Duration::hours(1));
        paid.transaction = Some(LinkedTransaction {
            id: 1,
            amount: Decimal::new(125, 2),
            status: Some(TransactionStatus::Completed),
        });
        let utc = FixedOffset::east_opt(0).unwrap();
        let report = AnalyticsReport::compute(&[paid], TimeWindow::Week, now, utc, &PrefixTable::standard());

        let bars = revenue_bars(&report);
        assert_eq!(bars.len(), 7);
        assert_eq!(bars[6], ("Thu 12".to_string(), 125));
        assert!(bars[..6].iter().all(|(_, cents)| *cents == 0));
    }
}
