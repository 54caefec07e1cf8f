/// SMS center view

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use super::dashboard::visible_range;
use super::Dashboard;
use crate::utils::{format_percent, format_timestamp, truncate_string};
use crate::widgets::stat_card::{render_row, StatCard};
use crate::widgets::status_badge;

impl Dashboard {
    pub(super) fn render_sms(&self, frame: &mut Frame, area: Rect, selected: usize) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(area);

        let stats = &self.sms_stats;
        render_row(
            frame,
            chunks[0],
            vec![
                StatCard::new("Sent Today", stats.sent_today.to_string()),
                StatCard::new("Received Today", stats.received_today.to_string()).accent(Color::Magenta),
                StatCard::new("Pending", stats.pending.to_string()).accent(Color::Yellow),
                StatCard::new("Delivery Rate", format_percent(stats.delivery_rate)).accent(Color::Green),
            ],
        );

        let header = Row::new(vec!["ID", "Time", "Direction", "From", "To", "Status", "Content"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        // borders plus header and its margin
        let rows_visible = chunks[1].height.saturating_sub(4) as usize;
        let range = visible_range(selected, self.messages.len(), rows_visible);

        let rows: Vec<Row> = self.messages[range.clone()]
            .iter()
            .enumerate()
            .map(|(offset, message)| {
                let row = Row::new(vec![
                    Cell::from(message.id.to_string()),
                    Cell::from(format_timestamp(&message.created_at)),
                    Cell::from(status_badge::direction(message.direction)),
                    Cell::from(message.sender_number.clone()),
                    Cell::from(message.recipient_number.clone()),
                    Cell::from(status_badge::message_status(message.status)),
                    Cell::from(truncate_string(&message.content, 50)),
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
                Constraint::Length(20),
                Constraint::Length(10),
                Constraint::Length(16),
                Constraint::Length(16),
                Constraint::Length(10),
                Constraint::Min(20),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Messages ({})", self.messages.len())),
        );

        frame.render_widget(table, chunks[1]);
    }
}
