//! Help overlay listing every key binding

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    Frame,
};

use super::popup;

/// Key bindings grouped by section, in display order
const BINDINGS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("Tab", "Next page"),
            ("Shift-Tab", "Previous page"),
            ("1-9", "Jump to page"),
            ("↑/k, ↓/j", "Move table selection"),
            ("q, Esc", "Quit application"),
        ],
    ),
    (
        "Data",
        &[
            ("r", "Refresh, bypassing the cache"),
            ("f", "Cycle the highlighted filter"),
            ("F", "Highlight the next filter"),
        ],
    ),
    (
        "Other",
        &[("p", "Show your profile"), ("?", "Toggle this help")],
    ),
];

/// Help text, one entry per row of the popup
pub fn lines() -> Vec<Line<'static>> {
    let key_width = BINDINGS
        .iter()
        .flat_map(|(_, keys)| keys.iter())
        .map(|(key, _)| key.chars().count())
        .max()
        .unwrap_or(0)
        + 2;

    let mut lines = vec![Line::from(Span::styled(
        "Keyboard Shortcuts",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];
    for (section, keys) in BINDINGS {
        lines.push(Line::from(""));
        lines.push(popup::heading(section));
        lines.extend(
            keys.iter()
                .map(|(key, description)| popup::key_line(key, description, key_width)),
        );
    }
    lines.push(Line::from(""));
    lines.push(popup::hint("Press Esc or ? to close"));
    lines
}

/// Renders the help overlay on top of the current view
pub fn render(frame: &mut Frame) {
    popup::render(frame, "Help", lines());
}
