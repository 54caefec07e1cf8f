/// Modal dialogs drawn over the current view

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use rust_decimal::Decimal;

use super::dashboard::popup_area;
use super::Dashboard;
use crate::app::{ComposeField, ComposeForm, Confirm, Dialog, TopUpForm, PAYMENT_METHODS};
use crate::core::models::{ApiKey, Message};
use crate::utils::constants::{MARKETPLACE, SMS_MAX_LEN, TOP_UP_PRESETS};
use crate::utils::{format_money, format_timestamp};
use crate::widgets::status_badge;

fn label_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    }
}

fn value_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::UNDERLINED)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn hint(text: &str) -> Line<'_> {
    Line::from(Span::styled(
        text,
        Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
    ))
}

fn or_placeholder(value: &str) -> &str {
    if value.is_empty() {
        "_"
    } else {
        value
    }
}

impl Dashboard {
    pub(super) fn render_dialog(&self, frame: &mut Frame, dialog: &Dialog, balance: Option<Decimal>, busy: bool) {
        let (title, lines, height) = match dialog {
            Dialog::Compose(form) => (" New Message ", compose_lines(form), 16),
            Dialog::TopUp(form) => (" Top Up Wallet ", top_up_lines(form, balance), 14),
            Dialog::NewKey(name) => (" New API Key ", new_key_lines(name), 9),
            Dialog::KeyCreated(key) => (" API Key Created ", key_created_lines(key), 11),
            Dialog::Marketplace(selected) => (
                " SIM Marketplace ",
                marketplace_lines(*selected, balance),
                MARKETPLACE.len() as u16 * 2 + 8,
            ),
            Dialog::Confirm(confirm) => (" Confirm ", confirm_lines(confirm), 7),
            Dialog::MessageDetail(message) => (" Message ", message_lines(message), 16),
        };

        let mut lines = lines;
        if busy {
            lines.push(Line::from(Span::styled("⏳ Working...", Style::default().fg(Color::Cyan))));
        }

        let area = popup_area(frame.size(), 80, height);
        frame.render_widget(Block::default().style(Style::default().bg(Color::Black)), area);

        let dialog_widget = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(dialog_widget, area);
    }
}

fn compose_lines(form: &ComposeForm) -> Vec<Line<'_>> {
    let mut lines = vec![Line::from(Span::styled("From SIM:", label_style(form.field == ComposeField::Sender)))];
    for (idx, sim) in form.senders.iter().enumerate().take(4) {
        let chosen = idx == form.sender;
        lines.push(Line::from(Span::styled(
            format!(
                "  {} {}  ({}/{} used)",
                if chosen { "►" } else { " " },
                sim.phone_number,
                sim.messages_used(),
                sim.messages_limit()
            ),
            if chosen {
                label_style(form.field == ComposeField::Sender)
            } else {
                Style::default().fg(Color::Gray)
            },
        )));
    }

    let recipient_active = form.field == ComposeField::Recipient;
    let content_active = form.field == ComposeField::Content;
    lines.extend([
        Line::from(""),
        Line::from(vec![
            Span::styled("To: ", label_style(recipient_active)),
            Span::styled(or_placeholder(&form.recipient), value_style(recipient_active)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Message ", label_style(content_active)),
            Span::styled(
                format!("({}/{}):", form.content.chars().count(), SMS_MAX_LEN),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(Span::styled(or_placeholder(&form.content), value_style(content_active))),
        Line::from(""),
        hint("Tab: Next field | ↑↓: Pick SIM | Enter: Send | Esc: Cancel"),
    ]);
    lines
}

fn top_up_lines(form: &TopUpForm, balance: Option<Decimal>) -> Vec<Line<'_>> {
    let presets: Vec<Span> = TOP_UP_PRESETS
        .iter()
        .enumerate()
        .map(|(idx, amount)| {
            let style = if form.custom.is_empty() && idx == form.preset {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Span::styled(format!(" ${} ", amount), style)
        })
        .collect();

    let amount = match form.amount() {
        Ok(amount) => format_money(amount),
        Err(_) => "invalid".to_string(),
    };

    vec![
        Line::from(vec![
            Span::styled("Current balance: ", Style::default().fg(Color::Gray)),
            Span::styled(
                balance.map(format_money).unwrap_or_else(|| "N/A".to_string()),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled("Preset:", label_style(form.custom.is_empty()))),
        Line::from(presets),
        Line::from(""),
        Line::from(vec![
            Span::styled("Custom amount: ", label_style(!form.custom.is_empty())),
            Span::styled(or_placeholder(&form.custom), value_style(!form.custom.is_empty())),
        ]),
        Line::from(vec![
            Span::styled("Payment method: ", Style::default().fg(Color::Gray)),
            Span::styled(PAYMENT_METHODS[form.method % PAYMENT_METHODS.len()], Style::default().fg(Color::White)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Total: ", Style::default().fg(Color::Gray)),
            Span::styled(amount, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(""),
        hint("← →: Preset | Type digits: Custom | Tab: Method | Enter: Pay | Esc: Cancel"),
    ]
}

fn new_key_lines(name: &str) -> Vec<Line<'_>> {
    vec![
        Line::from("Name the key after the system that will use it."),
        Line::from(""),
        Line::from(vec![
            Span::styled("Name: ", label_style(true)),
            Span::styled(or_placeholder(name), value_style(true)),
        ]),
        Line::from(""),
        hint("Enter: Create | Esc: Cancel"),
    ]
}

fn key_created_lines(key: &ApiKey) -> Vec<Line<'_>> {
    vec![
        Line::from(vec![
            Span::styled("Name: ", Style::default().fg(Color::Gray)),
            Span::raw(key.name.as_str()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            key.key.as_str(),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Copy this key now. It is masked everywhere else.",
            Style::default().fg(Color::Yellow),
        )),
        Line::from(""),
        hint("Enter / Esc: Close"),
    ]
}

fn marketplace_lines(selected: usize, balance: Option<Decimal>) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Balance: ", Style::default().fg(Color::Gray)),
            Span::styled(
                balance.map(format_money).unwrap_or_else(|| "N/A".to_string()),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(""),
    ];

    for (idx, offer) in MARKETPLACE.iter().enumerate() {
        let is_selected = idx == selected;
        let affordable = balance.map_or(true, |b| b >= offer.price());
        let style = match (is_selected, affordable) {
            (true, _) => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            (false, true) => Style::default().fg(Color::White),
            (false, false) => Style::default().fg(Color::DarkGray),
        };

        lines.push(Line::from(Span::styled(
            format!(
                "{} {:<16} {:<12} {:<16} {:>8}",
                if is_selected { "►" } else { " " },
                offer.country,
                offer.provider,
                offer.number,
                format_money(offer.price())
            ),
            style,
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "    {} | {} SMS | ★ {} | {}",
                offer.data_plan(),
                offer.messages_limit,
                offer.rating(),
                offer.coverage
            ),
            Style::default().fg(Color::Gray),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "↑↓: Select | Enter: Buy | Esc: Close",
        Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
    )));
    lines
}

fn confirm_lines(confirm: &Confirm) -> Vec<Line<'static>> {
    let question = match confirm {
        Confirm::DeleteSim { number, .. } => format!("Delete SIM {}?", number),
        Confirm::DeleteKey { name, .. } => format!("Delete API key '{}'? Clients using it will stop working.", name),
    };
    vec![
        Line::from(Span::styled(question, Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled(
            "y / Enter: Delete | n / Esc: Cancel",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )),
    ]
}

fn message_lines(message: &Message) -> Vec<Line<'_>> {
    let field = |name: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<12}", name), Style::default().fg(Color::Gray)),
            Span::raw(value),
        ])
    };

    let mut lines = vec![
        field("ID:", message.id.to_string()),
        Line::from(vec![
            Span::styled(format!("{:<12}", "Status:"), Style::default().fg(Color::Gray)),
            status_badge::message_status(message.status),
            Span::raw(" "),
            status_badge::direction(message.direction),
        ]),
        field("From:", message.sender_number.clone()),
        field("To:", message.recipient_number.clone()),
        field("Created:", format_timestamp(&message.created_at)),
    ];
    if let Some(tx) = &message.transaction {
        lines.push(field("Charge:", format_money(tx.amount)));
    }
    if let Some(error) = &message.error_message {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<12}", "Error:"), Style::default().fg(Color::Gray)),
            Span::styled(error.as_str(), Style::default().fg(Color::Red)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(message.content.as_str()));
    lines.push(Line::from(""));
    lines.push(hint("Enter / Esc: Close"));
    lines
}
