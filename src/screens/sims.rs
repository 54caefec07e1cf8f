/// SIM manager view

use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table},
    Frame,
};

use super::dashboard::visible_range;
use super::Dashboard;
use crate::core::sims::SimEntry;
use crate::utils::format_money;
use crate::widgets::stat_card::{render_row, StatCard};
use crate::widgets::status_badge;

impl Dashboard {
    pub(super) fn render_sims(&self, frame: &mut Frame, area: Rect, selected: usize) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(area);

        let stats = &self.sim_stats;
        let expiry = match stats.next_expiry_days {
            Some(days) if days < 0 => "expired".to_string(),
            Some(days) => format!("{} days", days),
            None => "-".to_string(),
        };
        render_row(
            frame,
            chunks[0],
            vec![
                StatCard::new("Active SIMs", format!("{}/{}", stats.active, stats.total)),
                StatCard::new("Messages Used", format!("{}/{}", stats.messages_used, stats.messages_limit))
                    .accent(Color::Magenta),
                StatCard::new("Monthly Cost", format_money(stats.monthly_cost)).accent(Color::Green),
                StatCard::new("Next Expiry", expiry).accent(Color::Yellow),
            ],
        );

        let now = Utc::now();
        let header = Row::new(vec!["ID", "Phone Number", "ICCID", "Status", "Plan", "Usage", "Expires"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        let entries = self.sims.entries();
        let rows_visible = chunks[1].height.saturating_sub(4) as usize;
        let range = visible_range(selected, entries.len(), rows_visible);

        let rows: Vec<Row> = entries[range.clone()]
            .iter()
            .enumerate()
            .map(|(offset, entry)| {
                let row = match entry {
                    SimEntry::Confirmed(sim) => {
                        let usage_color = if sim.has_quota() { Color::White } else { Color::Red };
                        let days = sim.days_until_expiry(now);
                        Row::new(vec![
                            Cell::from(sim.id.to_string()),
                            Cell::from(sim.phone_number.clone()),
                            Cell::from(sim.iccid.clone()),
                            Cell::from(status_badge::sim_status(sim)),
                            Cell::from(sim.data_plan.clone().unwrap_or_else(|| "-".to_string())),
                            Cell::from(Span::styled(
                                format!("{}/{}", sim.messages_used(), sim.messages_limit()),
                                Style::default().fg(usage_color),
                            )),
                            Cell::from(Span::styled(
                                sim.expiry_date.format("%Y-%m-%d").to_string(),
                                Style::default().fg(if days < 7 { Color::Yellow } else { Color::Gray }),
                            )),
                        ])
                    }
                    SimEntry::Pending { offer_id, .. } => Row::new(vec![
                        Cell::from("-"),
                        Cell::from(entry.phone_number().to_string()),
                        Cell::from(offer_id.clone()),
                        Cell::from(status_badge::pending()),
                        Cell::from(""),
                        Cell::from(""),
                        Cell::from(""),
                    ]),
                };

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
                Constraint::Length(16),
                Constraint::Length(22),
                Constraint::Length(13),
                Constraint::Length(16),
                Constraint::Length(11),
                Constraint::Min(10),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("SIM Cards"));

        frame.render_widget(table, chunks[1]);
    }
}
