//! Profile overlay for the signed-in user

use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
    Frame,
};

use super::popup;
use crate::app::App;

fn lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match &app.user {
        Some(user) => {
            let fields = user.profile_fields();
            let label_width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 2;
            lines.extend(fields.into_iter().map(|(label, value)| {
                Line::from(vec![
                    Span::styled(
                        format!("  {:<width$}", label, width = label_width),
                        Style::default().fg(Color::Gray),
                    ),
                    Span::styled(value, Style::default().fg(Color::White)),
                ])
            }));
        }
        None => lines.push(Line::from("  Not signed in. Run `cybershield login`.")),
    }
    if app.is_demo {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  Demo mode: some pages show sample data",
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::from(""));
    lines.push(popup::hint("Press Esc or p to close"));
    lines
}

/// Renders the profile overlay on top of the current view
pub fn render(frame: &mut Frame, app: &App) {
    popup::render(frame, "Profile", lines(app));
}
