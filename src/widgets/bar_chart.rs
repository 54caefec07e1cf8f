/// Bar charts for message volume and share breakdowns

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Paragraph, Widget},
};

const MAX_BAR_WIDTH: u16 = 9;

/// Vertical bars, one per labelled value
pub struct VolumeChart<'a> {
    title: &'a str,
    bars: Vec<(String, u64)>,
    color: Color,
}

impl<'a> VolumeChart<'a> {
    pub fn new(title: &'a str, bars: Vec<(String, u64)>) -> Self {
        Self {
            title,
            bars,
            color: Color::Cyan,
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// Widest bar that still fits `count` bars with one column of gap
pub fn bar_width(inner_width: u16, count: usize) -> u16 {
    if count == 0 {
        return 1;
    }
    let per_bar = inner_width / count as u16;
    per_bar.saturating_sub(1).clamp(1, MAX_BAR_WIDTH)
}

impl Widget for VolumeChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title(self.title);

        if self.bars.is_empty() {
            Paragraph::new("No data")
                .style(Style::default().fg(Color::DarkGray))
                .block(block)
                .render(area, buf);
            return;
        }

        let data: Vec<(&str, u64)> = self.bars.iter().map(|(label, value)| (label.as_str(), *value)).collect();
        let width = bar_width(area.width.saturating_sub(2), data.len());

        BarChart::default()
            .block(block)
            .data(data.as_slice())
            .bar_width(width)
            .bar_gap(1)
            .bar_style(Style::default().fg(self.color))
            .value_style(Style::default().fg(Color::Black).bg(self.color).add_modifier(Modifier::BOLD))
            .label_style(Style::default().fg(Color::Gray))
            .render(area, buf);
    }
}

/// Text bar proportional to `percentage` (0-100) over `width` cells
pub fn share_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Horizontal share rows: label, bar, percentage and count
pub struct ShareList<'a> {
    title: &'a str,
    rows: Vec<(String, f64, usize)>,
}

impl<'a> ShareList<'a> {
    pub fn new(title: &'a str, rows: Vec<(String, f64, usize)>) -> Self {
        Self { title, rows }
    }
}

impl Widget for ShareList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let label_width = self
            .rows
            .iter()
            .map(|(label, _, _)| label.chars().count())
            .max()
            .unwrap_or(0);
        let bar_cells = (area.width as usize).saturating_sub(label_width + 22).clamp(5, 40);

        let lines: Vec<Line> = if self.rows.is_empty() {
            vec![Line::from(Span::styled("No data", Style::default().fg(Color::DarkGray)))]
        } else {
            self.rows
                .iter()
                .map(|(label, percentage, count)| {
                    Line::from(vec![
                        Span::styled(format!("{:<width$} ", label, width = label_width), Style::default().fg(Color::White)),
                        Span::styled(share_bar(*percentage, bar_cells), Style::default().fg(Color::Cyan)),
                        Span::styled(format!(" {:>5.1}%", percentage), Style::default().fg(Color::Yellow)),
                        Span::styled(format!(" ({})", count), Style::default().fg(Color::Gray)),
                    ])
                })
                .collect()
        };

        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(self.title))
            .render(area, buf);
    }
}
