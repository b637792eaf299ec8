//! Centered modal popups
//!
//! A popup is sized to its content: one row per line plus the border, and
//! the widest line plus padding, clamped to the terminal.

use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const MIN_WIDTH: u16 = 30;
/// Border plus one column of space on each side
const PADDING: u16 = 4;

/// A `key  description` row with the key column padded to `key_width`
pub fn key_line(key: &str, description: &str, key_width: usize) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("  {:<width$}", key, width = key_width),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(description.to_string()),
    ])
}

pub fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

pub fn hint(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::DarkGray),
    ))
}

/// Area of a popup holding `lines` inside `area`
pub fn popup_area(lines: &[Line], area: Rect) -> Rect {
    let content_width = lines.iter().map(Line::width).max().unwrap_or(0);
    let width = (content_width as u16)
        .saturating_add(PADDING)
        .max(MIN_WIDTH)
        .min(area.width);
    let height = (lines.len() as u16).saturating_add(2).min(area.height);

    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(row);
    popup
}

/// Clears the space behind and draws `lines` in a bordered popup
pub fn render(frame: &mut Frame, title: &str, lines: Vec<Line<'static>>) {
    let area = popup_area(&lines, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
