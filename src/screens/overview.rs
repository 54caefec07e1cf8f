/// Dashboard view: headline counters, live activity and recent messages

use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Paragraph, Row, Sparkline, Table},
    Frame,
};

use super::Dashboard;
use crate::utils::{format_age, format_money, format_percent, truncate_string};
use crate::widgets::stat_card::{render_row, StatCard};
use crate::widgets::status_badge;

impl Dashboard {
    pub(super) fn render_overview(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Cards
                Constraint::Length(7), // Live activity
                Constraint::Min(0),    // Recent messages
            ])
            .split(area);

        let Some(stats) = &self.overview_stats else {
            let loading = Paragraph::new("Loading overview...")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL).title("Overview"));
            frame.render_widget(loading, area);
            return;
        };

        render_row(
            frame,
            chunks[0],
            vec![
                StatCard::new("Messages Sent", stats.messages_sent.to_string()),
                StatCard::new("Messages Received", stats.messages_received.to_string()).accent(Color::Magenta),
                StatCard::new("Active SIMs", format!("{}/{}", stats.active_sims, stats.total_sims))
                    .accent(Color::Yellow),
                StatCard::new(
                    "Balance",
                    stats.balance.map(format_money).unwrap_or_else(|| "N/A".to_string()),
                )
                .accent(Color::Green),
                StatCard::new("Delivery Rate", format_percent(stats.delivery_rate)).accent(Color::Green),
            ],
        );

        let samples = self.live.samples();
        let latest = samples.last().copied().unwrap_or(0);
        let live = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Live activity ({} new in last sample)", latest)),
            )
            .data(&samples)
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(live, chunks[1]);

        let now = Utc::now();
        let header = Row::new(vec!["When", "Direction", "Number", "Status", "Content"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        let rows: Vec<Row> = stats
            .recent
            .iter()
            .map(|message| {
                Row::new(vec![
                    Cell::from(format_age(&message.created_at, now)),
                    Cell::from(status_badge::direction(message.direction)),
                    Cell::from(message.counterpart().to_string()),
                    Cell::from(status_badge::message_status(message.status)),
                    Cell::from(truncate_string(&message.content, 60)),
                ])
            })
            .collect();

        let mut title = "Recent messages".to_string();
        if let Some(overview) = &self.overview {
            if !overview.failed.is_empty() {
                title.push_str(" (partial)");
            }
        }

        let table = Table::new(
            rows,
            [
                Constraint::Length(12),
                Constraint::Length(10),
                Constraint::Length(18),
                Constraint::Length(11),
                Constraint::Min(20),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(Span::raw(title)));

        frame.render_widget(table, chunks[2]);
    }
}
