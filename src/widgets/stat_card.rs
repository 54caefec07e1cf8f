/// Headline number with a caption, drawn in a bordered box

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

#[derive(Debug, Clone)]
pub struct StatCard<'a> {
    title: &'a str,
    value: String,
    detail: Option<String>,
    accent: Color,
}

impl<'a> StatCard<'a> {
    pub fn new(title: &'a str, value: impl Into<String>) -> Self {
        Self {
            title,
            value: value.into(),
            detail: None,
            accent: Color::Cyan,
        }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn accent(mut self, accent: Color) -> Self {
        self.accent = accent;
        self
    }
}

impl Widget for StatCard<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut lines = vec![Line::from(Span::styled(
            self.value,
            Style::default().fg(self.accent).add_modifier(Modifier::BOLD),
        ))];
        if let Some(detail) = self.detail {
            lines.push(Line::from(Span::styled(detail, Style::default().fg(Color::Gray))));
        }

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Span::styled(self.title, Style::default().fg(Color::Yellow))),
            )
            .render(area, buf);
    }
}

/// Lay cards out side by side with equal widths
pub fn render_row(frame: &mut Frame, area: Rect, cards: Vec<StatCard<'_>>) {
    if cards.is_empty() {
        return;
    }

    let count = cards.len() as u32;
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, count); cards.len()])
        .split(area);

    for (card, column) in cards.into_iter().zip(columns.iter()) {
        frame.render_widget(card, *column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(card: StatCard<'_>, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        card.render(area, &mut buf);

        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buf.get(x, y).symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_card_shows_title_value_and_detail() {
        let text = rendered(StatCard::new("Balance", "$42.00").detail("wallet"), 20, 4);
        assert!(text.contains("Balance"));
        assert!(text.contains("$42.00"));
        assert!(text.contains("wallet"));
    }
}
