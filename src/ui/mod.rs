//! UI rendering module for the CyberShield dashboard
//!
//! This module contains all the rendering logic for the terminal user interface,
//! using the ratatui library for TUI components.

pub mod help_overlay;
pub mod page;
pub mod popup;
pub mod profile;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, AppState};

pub use help_overlay::render as render_help_overlay;
pub use page::render as render_page;

/// Renders the UI based on the current application state
pub fn render(frame: &mut Frame, app: &App) {
    match &app.state {
        AppState::Loading => render_loading(frame, app),
        AppState::Page(_) => render_page(frame, app),
    }

    if app.show_profile {
        profile::render(frame, app);
    }
    if app.show_help {
        render_help_overlay(frame);
    }
}

/// Renders a loading message while a page is being fetched
fn render_loading(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Center the loading message vertically
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(3),
            Constraint::Percentage(45),
        ])
        .split(area);

    let loading_text = Paragraph::new(format!("Loading {}...", app.current_page.title()))
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);

    frame.render_widget(loading_text, chunks[1]);
}
