/// Login screen shown while no session is held

use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::dashboard::popup_area;
use crate::app::LoginForm;

pub fn render(frame: &mut Frame, form: &LoginForm, api_url: &str, status: Option<&str>, busy: bool) {
    let area = popup_area(frame.size(), 60, 15);

    let field_style = |active: bool| {
        if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };
    let masked = "•".repeat(form.password.chars().count());

    let mut lines = vec![
        Line::from(Span::styled(
            "SMS Gateway Pro",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(api_url, Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from(vec![
            Span::styled("Username: ", field_style(form.field == 0)),
            Span::raw(if form.username.is_empty() { "_" } else { form.username.as_str() }),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Password: ", field_style(form.field == 1)),
            Span::raw(if masked.is_empty() { "_".to_string() } else { masked }),
        ]),
        Line::from(""),
    ];

    if busy {
        lines.push(Line::from(Span::styled("⏳ Signing in...", Style::default().fg(Color::Cyan))));
    } else if let Some(status) = status {
        lines.push(Line::from(Span::styled(status, Style::default().fg(Color::Red))));
    } else {
        lines.push(Line::from(""));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab: Switch field | Enter: Sign in | Esc: Quit",
        Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
    )));
    lines.push(Line::from(Span::styled(
        "No account? Run `smsgw register`",
        Style::default().fg(Color::DarkGray),
    )));

    let login = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(Span::styled(" Sign in ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))),
    );
    frame.render_widget(login, area);
}
