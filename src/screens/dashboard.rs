/// Main dashboard screen

use chrono::{FixedOffset, Local, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use rust_decimal::Decimal;
use std::ops::Range;
use uuid::Uuid;

use crate::app::{Screen, UiState};
use crate::core::models::{ApiKey, Message, Sim, User};
use crate::core::overview::OverviewStats;
use crate::core::sims::SimStats;
use crate::core::sms::SmsStats;
use crate::core::wallet::{WalletSnapshot, WalletSummary};
use crate::core::{AnalyticsReport, LiveSeries, Overview, PrefixTable, SimRoster, TimeWindow};
use crate::utils::constants::SimOffer;
use crate::utils::format_money;

/// Fetched data for every view plus the aggregates derived from it
pub struct Dashboard {
    pub title: String,
    pub(super) overview: Option<Overview>,
    pub(super) overview_stats: Option<OverviewStats>,
    pub(super) live: LiveSeries,
    pub(super) messages: Vec<Message>,
    pub(super) sms_stats: SmsStats,
    pub(super) sims: SimRoster,
    pub(super) sim_stats: SimStats,
    pub(super) wallet: Option<WalletSnapshot>,
    pub(super) wallet_summary: WalletSummary,
    pub(super) api_keys: Vec<ApiKey>,
    pub(super) window: TimeWindow,
    pub(super) prefixes: PrefixTable,
    pub(super) analytics: Option<AnalyticsReport>,
}

fn local_offset() -> FixedOffset {
    *Local::now().offset()
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            title: "SMS Gateway Pro".to_string(),
            overview: None,
            overview_stats: None,
            live: LiveSeries::default(),
            messages: Vec::new(),
            sms_stats: SmsStats::default(),
            sims: SimRoster::default(),
            sim_stats: SimStats::default(),
            wallet: None,
            wallet_summary: WalletSummary::default(),
            api_keys: Vec::new(),
            window: TimeWindow::default(),
            prefixes: PrefixTable::standard(),
            analytics: None,
        }
    }

    pub fn update_overview(&mut self, overview: &Overview) {
        self.overview_stats = Some(overview.stats());
        self.overview = Some(overview.clone());
    }

    /// Feed a live sample; also keeps the recent list on the overview current
    pub fn record_live(&mut self, messages: Vec<Message>) {
        self.live.record(&messages);
        if let Some(overview) = &mut self.overview {
            overview.messages = messages.clone();
            self.overview_stats = Some(overview.stats());
        }
        self.update_messages(messages);
    }

    pub fn update_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.sms_stats = SmsStats::from_messages(&self.messages, Utc::now(), local_offset());
        self.recompute_analytics();
    }

    /// Prepend freshly sent messages without waiting for the next poll
    pub fn add_messages(&mut self, sent: Vec<Message>) {
        let sent_ids: Vec<i64> = sent.iter().map(|m| m.id).collect();
        let mut messages = sent;
        messages.extend(
            std::mem::take(&mut self.messages)
                .into_iter()
                .filter(|m| !sent_ids.contains(&m.id)),
        );
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.update_messages(messages);
    }

    pub fn update_sims(&mut self, sims: Vec<Sim>) {
        self.sims.replace(sims);
        self.refresh_sim_stats();
    }

    pub fn apply_sim(&mut self, sim: Sim) {
        if !self.sims.apply(sim) {
            tracing::debug!("updated SIM is not in the local list");
        }
        self.refresh_sim_stats();
    }

    pub fn remove_sim(&mut self, id: i64) {
        self.sims.remove(id);
        self.refresh_sim_stats();
    }

    pub fn add_pending_sim(&mut self, offer: &SimOffer) -> Uuid {
        self.sims.add_pending(offer)
    }

    pub fn confirm_sim(&mut self, local_ref: Uuid, sim: Sim) {
        self.sims.confirm(local_ref, sim);
        self.refresh_sim_stats();
    }

    pub fn discard_sim(&mut self, local_ref: Uuid) {
        self.sims.discard(local_ref);
    }

    fn refresh_sim_stats(&mut self) {
        self.sim_stats = SimStats::from_sims(&self.sims.confirmed(), Utc::now());
    }

    pub fn update_wallet(&mut self, snapshot: WalletSnapshot) {
        self.wallet_summary = snapshot.summary(Utc::now());
        self.wallet = Some(snapshot);
    }

    pub fn update_api_keys(&mut self, keys: Vec<ApiKey>) {
        self.api_keys = keys;
    }

    pub fn add_api_key(&mut self, key: ApiKey) {
        self.api_keys.retain(|k| k.id != key.id);
        self.api_keys.push(key);
    }

    pub fn remove_api_key(&mut self, id: i64) {
        self.api_keys.retain(|k| k.id != id);
    }

    /// Switch the analytics window and recompute
    pub fn cycle_window(&mut self) -> TimeWindow {
        self.window = self.window.next();
        self.recompute_analytics();
        self.window
    }

    fn recompute_analytics(&mut self) {
        self.analytics = Some(AnalyticsReport::compute(
            &self.messages,
            self.window,
            Utc::now(),
            local_offset(),
            &self.prefixes,
        ));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn sims(&self) -> &SimRoster {
        &self.sims
    }

    pub fn api_keys(&self) -> &[ApiKey] {
        &self.api_keys
    }

    /// SIMs that can send right now
    pub fn senders(&self) -> Vec<Sim> {
        self.sims
            .confirmed()
            .into_iter()
            .filter(|s| s.is_active && s.has_quota())
            .collect()
    }

    /// Rows the selection can move over on a screen
    pub fn item_count(&self, screen: Screen) -> usize {
        match screen {
            Screen::Sms => self.messages.len(),
            Screen::Sims => self.sims.len(),
            Screen::Wallet => self.wallet.as_ref().map_or(0, |w| w.transactions.len()),
            Screen::ApiKeys => self.api_keys.len(),
            Screen::Dashboard | Screen::Analytics => 0,
        }
    }

    pub fn render(&self, frame: &mut Frame, ui: &UiState, user: Option<&User>, balance: Option<Decimal>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Menu
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Footer
            ])
            .split(frame.size());

        let mut title_spans = vec![
            Span::styled(&self.title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::raw("  "),
        ];
        if let Some(user) = user {
            title_spans.push(Span::styled("User: ", Style::default().fg(Color::Gray)));
            title_spans.push(Span::styled(user.display_name().to_string(), Style::default().fg(Color::White)));
            title_spans.push(Span::raw(" | "));
        }
        title_spans.push(Span::styled("Balance: ", Style::default().fg(Color::Gray)));
        title_spans.push(match balance {
            Some(balance) => Span::styled(
                format_money(balance),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            None => Span::styled("…", Style::default().fg(Color::DarkGray)),
        });

        let title = Paragraph::new(Line::from(title_spans))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, chunks[0]);

        // Menu bar
        let menu_items: Vec<Span> = Screen::all()
            .iter()
            .enumerate()
            .flat_map(|(i, screen)| {
                let style = if *screen == ui.screen {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                vec![
                    Span::styled(format!(" [{}] {} ", i + 1, screen.title()), style),
                    Span::raw("  "),
                ]
            })
            .collect();

        let menu = Paragraph::new(Line::from(menu_items)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(menu, chunks[1]);

        match ui.screen {
            Screen::Dashboard => self.render_overview(frame, chunks[2]),
            Screen::Sms => self.render_sms(frame, chunks[2], ui.selected),
            Screen::Sims => self.render_sims(frame, chunks[2], ui.selected),
            Screen::Wallet => self.render_wallet(frame, chunks[2], ui.selected, balance),
            Screen::ApiKeys => self.render_api_keys(frame, chunks[2], ui.selected, &ui.revealed_keys),
            Screen::Analytics => self.render_analytics(frame, chunks[2]),
        }

        // Footer with status message or key hints
        let footer_text = match &ui.status_message {
            Some(status) => status.clone(),
            None => match ui.screen {
                Screen::Dashboard => "[← →] Next screen | [1-6] Jump | [r]efresh | [L]ogout | [?] Help | [q]uit",
                Screen::Sms => "[↑↓] Select | [Enter] Details | [n]ew message | [r]efresh | [?] Help | [q]uit",
                Screen::Sims => "[↑↓] Select | [t]oggle | [m]arketplace | [d]elete | [r]efresh | [?] Help | [q]uit",
                Screen::Wallet => "[↑↓] Select | [t]op up | [r]efresh | [?] Help | [q]uit",
                Screen::ApiKeys => "[↑↓] Select | [n]ew key | [v] Reveal | [d]elete | [r]efresh | [?] Help | [q]uit",
                Screen::Analytics => "[w] Window (7d/30d/90d) | [r]efresh | [?] Help | [q]uit",
            }
            .to_string(),
        };

        let footer = Paragraph::new(footer_text)
            .alignment(Alignment::Center)
            .style(if ui.status_message.is_some() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);

        if ui.show_help {
            self.render_help(frame, ui.screen);
        }

        if let Some(dialog) = &ui.dialog {
            self.render_dialog(frame, dialog, balance, ui.busy);
        }
    }

    fn render_help(&self, frame: &mut Frame, current_screen: Screen) {
        let popup = popup_area(frame.size(), 80, 26);

        let heading = |text: &'static str| {
            Line::from(Span::styled(text, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)))
        };

        let mut help_text = vec![
            Line::from(Span::styled(
                "SMS Gateway Pro - Keyboard Shortcuts",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            heading("Global Navigation:"),
            Line::from("  [1-6]          Jump to screen"),
            Line::from("  [← →]          Next/Previous screen"),
            Line::from("  [↑ ↓]          Select items"),
            Line::from(""),
            heading("Global Commands:"),
            Line::from("  [?] / [F1]     Toggle this help screen"),
            Line::from("  [r]            Refresh the current screen"),
            Line::from("  [L]            Log out"),
            Line::from("  [q] / [Esc]    Quit application"),
            Line::from(""),
        ];

        match current_screen {
            Screen::Dashboard => {
                help_text.push(heading("Dashboard:"));
                help_text.push(Line::from("  Counters refresh every list interval, live activity every few seconds"));
            }
            Screen::Sms => {
                help_text.push(heading("SMS Center:"));
                help_text.push(Line::from("  [n]            Compose a message"));
                help_text.push(Line::from("  [Enter]        Show message details"));
                help_text.push(Line::from("  In the composer: [Tab] next field, [↑↓] pick the sending SIM"));
            }
            Screen::Sims => {
                help_text.push(heading("SIM Manager:"));
                help_text.push(Line::from("  [t] / [Space]  Activate or deactivate the selected SIM"));
                help_text.push(Line::from("  [m]            Open the SIM marketplace"));
                help_text.push(Line::from("  [d]            Delete the selected SIM"));
            }
            Screen::Wallet => {
                help_text.push(heading("Wallet:"));
                help_text.push(Line::from("  [t]            Top up the wallet"));
                help_text.push(Line::from("  In the dialog: [← →] preset, type a custom amount, [Tab] method"));
            }
            Screen::ApiKeys => {
                help_text.push(heading("API Keys:"));
                help_text.push(Line::from("  [n]            Create a key"));
                help_text.push(Line::from("  [v]            Reveal or hide the selected key"));
                help_text.push(Line::from("  [d]            Delete the selected key"));
            }
            Screen::Analytics => {
                help_text.push(heading("Analytics:"));
                help_text.push(Line::from("  [w]            Cycle the window between 7, 30 and 90 days"));
            }
        }

        help_text.push(Line::from(""));
        help_text.push(Line::from(Span::styled(
            "Press [?] or [Esc] to close",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )));

        frame.render_widget(Block::default().style(Style::default().bg(Color::Black)), popup);

        let help = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(Span::styled(" Help ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(help, popup);
    }
}

/// Centered rectangle of at most `width` x `height`
pub(super) fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = area.width.min(width);
    let height = area.height.min(height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

/// Slice of rows to draw so that `selected` stays on screen
pub(super) fn visible_range(selected: usize, len: usize, rows: usize) -> Range<usize> {
    if rows == 0 || len == 0 {
        return 0..0;
    }
    let start = selected.min(len - 1).saturating_sub(rows - 1);
    start..(start + rows).min(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Direction, MessageStatus};
    use crate::core::testing::{message, outbound, sim};
    use crate::utils::constants::MARKETPLACE;

    #[test]
    fn test_visible_range_follows_selection() {
        assert_eq!(visible_range(0, 50, 10), 0..10);
        assert_eq!(visible_range(9, 50, 10), 0..10);
        assert_eq!(visible_range(10, 50, 10), 1..11);
        assert_eq!(visible_range(49, 50, 10), 40..50);
        assert_eq!(visible_range(3, 4, 10), 0..4);
        assert_eq!(visible_range(0, 0, 10), 0..0);
        assert_eq!(visible_range(5, 10, 0), 0..0);
    }

    #[test]
    fn test_popup_is_centered_and_clamped() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(popup_area(area, 80, 20), Rect::new(10, 10, 80, 20));
        assert_eq!(popup_area(Rect::new(0, 0, 50, 10), 80, 20), Rect::new(0, 0, 50, 10));
    }

    #[test]
    fn test_sent_messages_are_merged_newest_first() {
        let now = Utc::now();
        let mut dashboard = Dashboard::new();
        dashboard.update_messages(vec![message(
            1,
            Direction::Inbound,
            MessageStatus::Received,
            "+15550101",
            now - chrono::Duration::minutes(5),
        )]);

        dashboard.add_messages(vec![outbound(2, MessageStatus::Sent, "+15550102", now)]);
        let ids: Vec<i64> = dashboard.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(dashboard.analytics.as_ref().map(|a| a.total), Some(2));
    }

    #[test]
    fn test_pending_sim_counts_as_row_until_discarded() {
        let mut dashboard = Dashboard::new();
        dashboard.update_sims(vec![sim(1, true)]);

        let local = dashboard.add_pending_sim(&MARKETPLACE[0]);
        assert_eq!(dashboard.item_count(Screen::Sims), 2);
        assert_eq!(dashboard.senders().len(), 1);

        dashboard.discard_sim(local);
        assert_eq!(dashboard.item_count(Screen::Sims), 1);
        assert_eq!(dashboard.sim_stats.active, 1);
    }
}
