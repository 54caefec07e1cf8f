/// Wallet view

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};
use rust_decimal::Decimal;

use super::dashboard::visible_range;
use super::Dashboard;
use crate::utils::{format_money, format_timestamp, truncate_string};
use crate::widgets::stat_card::{render_row, StatCard};
use crate::widgets::status_badge;

impl Dashboard {
    pub(super) fn render_wallet(&self, frame: &mut Frame, area: Rect, selected: usize, balance: Option<Decimal>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(area);

        let Some(snapshot) = &self.wallet else {
            let loading = Paragraph::new("Loading wallet...")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL).title("Wallet"));
            frame.render_widget(loading, area);
            return;
        };

        let summary = &self.wallet_summary;
        let shown_balance = balance.unwrap_or_else(|| snapshot.balance());
        render_row(
            frame,
            chunks[0],
            vec![
                StatCard::new("Balance", format_money(shown_balance)).accent(Color::Green),
                StatCard::new("Total Top-ups", format_money(summary.total_top_ups)),
                StatCard::new("Total Spent", format_money(summary.total_spent)).accent(Color::Red),
                StatCard::new("Spent (30 days)", format_money(summary.spent_last_30_days))
                    .detail(format!("{} pending", summary.pending_count))
                    .accent(Color::Yellow),
            ],
        );

        let header = Row::new(vec!["ID", "Date", "Type", "Amount", "Status", "Description"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        let transactions = &snapshot.transactions;
        let rows_visible = chunks[1].height.saturating_sub(4) as usize;
        let range = visible_range(selected, transactions.len(), rows_visible);

        let rows: Vec<Row> = transactions[range.clone()]
            .iter()
            .enumerate()
            .map(|(offset, tx)| {
                let amount_color = if tx.signed_amount().is_sign_negative() {
                    Color::Red
                } else {
                    Color::Green
                };
                let row = Row::new(vec![
                    Cell::from(tx.id.to_string()),
                    Cell::from(format_timestamp(&tx.created_at)),
                    Cell::from(status_badge::transaction_kind(tx.kind)),
                    Cell::from(Span::styled(format_money(tx.signed_amount()), Style::default().fg(amount_color))),
                    Cell::from(status_badge::transaction_status(tx.status)),
                    Cell::from(truncate_string(&tx.description, 60)),
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
                Constraint::Length(8),
                Constraint::Length(12),
                Constraint::Length(11),
                Constraint::Min(20),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Transactions ({})", summary.transaction_count)),
        );

        frame.render_widget(table, chunks[1]);
    }
}
