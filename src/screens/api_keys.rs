/// API key view

use chrono::Utc;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};
use std::collections::HashSet;

use super::dashboard::visible_range;
use super::Dashboard;
use crate::core::api_keys::display_key;
use crate::utils::{format_age, format_timestamp};

impl Dashboard {
    pub(super) fn render_api_keys(&self, frame: &mut Frame, area: Rect, selected: usize, revealed: &HashSet<i64>) {
        let now = Utc::now();
        let header = Row::new(vec!["ID", "Name", "Key", "Status", "Created", "Last Used"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        let rows_visible = area.height.saturating_sub(4) as usize;
        let range = visible_range(selected, self.api_keys.len(), rows_visible);

        let rows: Vec<Row> = self.api_keys[range.clone()]
            .iter()
            .enumerate()
            .map(|(offset, key)| {
                let status = if key.is_active {
                    Span::styled("active", Style::default().fg(Color::Green))
                } else {
                    Span::styled("revoked", Style::default().fg(Color::Red))
                };
                let last_used = key
                    .last_used_at
                    .map(|t| format_age(&t, now))
                    .unwrap_or_else(|| "never".to_string());

                let row = Row::new(vec![
                    Cell::from(key.id.to_string()),
                    Cell::from(key.name.clone()),
                    Cell::from(display_key(key, revealed.contains(&key.id))),
                    Cell::from(status),
                    Cell::from(format_timestamp(&key.created_at)),
                    Cell::from(last_used),
                ]);

                if range.start + offset == selected {
                    row.style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
                } else {
                    row
                }
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Length(24),
                Constraint::Min(20),
                Constraint::Length(9),
                Constraint::Length(20),
                Constraint::Length(12),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("API Keys ({})", self.api_keys.len())),
        );

        frame.render_widget(table, area);
    }
}
