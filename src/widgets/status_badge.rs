/// Coloured status labels for tables

use ratatui::{
    style::{Color, Modifier, Style},
    text::Span,
};

use crate::core::models::{Direction, MessageStatus, Sim, SimStatus, TransactionKind, TransactionStatus};

pub fn message_status_color(status: MessageStatus) -> Color {
    match status {
        MessageStatus::Delivered => Color::Green,
        MessageStatus::Sent => Color::Cyan,
        MessageStatus::Pending => Color::Yellow,
        MessageStatus::Failed => Color::Red,
        MessageStatus::Received => Color::Blue,
    }
}

pub fn message_status(status: MessageStatus) -> Span<'static> {
    Span::styled(status.to_string(), Style::default().fg(message_status_color(status)))
}

pub fn direction(direction: Direction) -> Span<'static> {
    match direction {
        Direction::Outbound => Span::styled("→ out", Style::default().fg(Color::Cyan)),
        Direction::Inbound => Span::styled("← in", Style::default().fg(Color::Magenta)),
    }
}

pub fn sim_status(sim: &Sim) -> Span<'static> {
    let color = match sim.status {
        SimStatus::Active if sim.is_active => Color::Green,
        SimStatus::Active | SimStatus::Inactive => Color::Gray,
        SimStatus::Suspended => Color::Yellow,
        SimStatus::Expired => Color::Red,
    };
    Span::styled(sim.status.to_string(), Style::default().fg(color))
}

pub fn transaction_status(status: TransactionStatus) -> Span<'static> {
    let color = match status {
        TransactionStatus::Completed => Color::Green,
        TransactionStatus::Pending => Color::Yellow,
        TransactionStatus::Failed => Color::Red,
    };
    Span::styled(status.to_string(), Style::default().fg(color))
}

pub fn transaction_kind(kind: TransactionKind) -> Span<'static> {
    match kind {
        TransactionKind::Credit => Span::styled("credit", Style::default().fg(Color::Green)),
        TransactionKind::Debit => Span::styled("debit", Style::default().fg(Color::Red)),
    }
}

/// Placeholder rows for requests still in flight
pub fn pending() -> Span<'static> {
    Span::styled(
        "provisioning",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_badges() {
        let span = message_status(MessageStatus::Failed);
        assert_eq!(span.content, "failed");
        assert_eq!(span.style.fg, Some(Color::Red));
        assert_eq!(message_status(MessageStatus::Delivered).style.fg, Some(Color::Green));
    }
}
