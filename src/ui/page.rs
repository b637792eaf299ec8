//! Dashboard page rendering
//!
//! Renders one loaded page: tab bar, header, summary cards, a bar chart of
//! the page's group counts and the row table, with a status line at the
//! bottom.

use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState, Tabs},
    Frame,
};

use crate::app::App;
use crate::data::{field_text, PageData, PageKind};

/// Color for a severity or threat level value
pub fn severity_color(value: &str) -> Color {
    match value.to_lowercase().as_str() {
        "critical" => Color::Red,
        "high" => Color::LightRed,
        "medium" => Color::Yellow,
        "low" => Color::Green,
        "info" => Color::Blue,
        _ => Color::Gray,
    }
}

/// Renders the current page
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Tabs
            Constraint::Length(2), // Header
            Constraint::Length(3), // Cards
            Constraint::Min(5),    // Chart + table
            Constraint::Length(1), // Status line
        ])
        .split(area);

    render_tabs(frame, app, chunks[0]);
    render_header(frame, app, chunks[1]);

    match app.current_data() {
        Some(page) => {
            render_cards(frame, page, chunks[2]);

            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
                .split(chunks[3]);
            render_chart(frame, page, body[0]);
            render_table(frame, app, page, body[1]);
        }
        None => {
            let message = Paragraph::new("No data loaded. Press r to retry.")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(message, chunks[3]);
        }
    }

    render_status(frame, app, chunks[4]);
}

/// Renders the page tabs, numbered for the `1`-`9` shortcuts
fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<String> = PageKind::ALL
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            if i < 9 {
                format!("{} {}", i + 1, kind.slug())
            } else {
                kind.slug().to_string()
            }
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.current_page.index())
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider("│");

    frame.render_widget(tabs, area);
}

/// Renders the header with page title, user and last refresh time
fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let who = match (&app.user, app.is_demo) {
        (_, true) => "DEMO".to_string(),
        (Some(user), false) => user.email.clone(),
        (None, false) => "not signed in".to_string(),
    };

    let updated = app
        .last_refresh
        .map(|t| format!("Updated {}", t.format("%H:%M:%S")))
        .unwrap_or_else(|| "Not loaded".to_string());

    let separator = "─".repeat((area.width as usize).saturating_sub(2));

    let lines = vec![
        Line::from(vec![
            Span::styled(
                "CYBERSHIELD",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                app.current_page.title(),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(who, Style::default().fg(Color::Yellow)),
            Span::raw("  "),
            Span::styled(updated, Style::default().fg(Color::DarkGray)),
        ]),
        Line::from(Span::styled(
            separator,
            Style::default().fg(Color::DarkGray),
        )),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

/// Renders the total and stat cards on one line
fn render_cards(frame: &mut Frame, page: &PageData, area: Rect) {
    let mut spans = vec![
        Span::styled("Total ", Style::default().fg(Color::Gray)),
        Span::styled(
            page.summary.total.to_string(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ];

    for card in &page.summary.cards {
        spans.push(Span::styled("  │  ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(
            format!("{} ", card.label),
            Style::default().fg(Color::Gray),
        ));
        spans.push(Span::styled(
            card.value.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let block = Block::default()
        .title(" Summary ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

/// Renders group counts as a horizontal bar chart
fn render_chart(frame: &mut Frame, page: &PageData, area: Rect) {
    let group_by = page.kind.definition().group_by;
    let block = Block::default()
        .title(format!(" By {} ", group_by.replace('_', " ")))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let data: Vec<(&str, u64)> = page
        .summary
        .groups
        .iter()
        .map(|(name, count)| (name.as_str(), *count as u64))
        .collect();

    let chart = BarChart::default()
        .block(block)
        .direction(Direction::Horizontal)
        .data(data.as_slice())
        .bar_width(1)
        .bar_gap(0)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    frame.render_widget(chart, area);
}

/// Renders the rows table with the selected row highlighted
fn render_table(frame: &mut Frame, app: &App, page: &PageData, area: Rect) {
    let definition = page.kind.definition();

    let header = Row::new(definition.columns.iter().map(|column| {
        Cell::from(column.header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().fg(Color::Yellow));

    let rows = page.rows.iter().map(|row| {
        Row::new(definition.columns.iter().map(|column| {
            let text = field_text(row, column.field);
            let style = if column.field == definition.group_by
                || column.field == "severity"
                || column.field == "threat_level"
            {
                Style::default().fg(severity_color(&text))
            } else {
                Style::default()
            };
            Cell::from(text).style(style)
        }))
    });

    let widths = vec![Constraint::Fill(1); definition.columns.len()];
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!(" {} ({}) ", definition.title, page.summary.total))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("\u{25B8} "); // ▸

    let mut state = TableState::default();
    if !page.rows.is_empty() {
        state.select(Some(app.selected_index));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

/// Renders key hints, cache indicator, errors and data freshness
fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page  "),
        Span::styled("j/k", Style::default().fg(Color::Yellow)),
        Span::raw(" Select  "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" Refresh  "),
        Span::styled("p", Style::default().fg(Color::Yellow)),
        Span::raw(" Profile  "),
        Span::styled("?", Style::default().fg(Color::Yellow)),
        Span::raw(" Help  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" Quit"),
    ];

    if let Some(filter) = app.focused_filter() {
        let value = app.filter_value(filter.key).unwrap_or("all");
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled("f", Style::default().fg(Color::Yellow)));
        spans.push(Span::styled(
            format!(" {}: {}", filter.key, value),
            Style::default().fg(Color::White),
        ));
    }

    if let Some(error) = &app.error {
        spans.push(Span::styled(
            format!(" │ Error: {}", error),
            Style::default().fg(Color::Red),
        ));
    } else if let Some(page) = app.current_data() {
        if page.from_cache {
            spans.push(Span::styled(" │ cached", Style::default().fg(Color::Cyan)));
        }
        if !page.warnings.is_empty() {
            spans.push(Span::styled(
                format!(" │ {} source(s) unavailable", page.warnings.len()),
                Style::default().fg(Color::Yellow),
            ));
        }
        let mins_ago = (Local::now() - page.fetched_at).num_minutes();
        let freshness = if mins_ago < 1 {
            " │ Data: just now".to_string()
        } else {
            format!(" │ Data: {}m ago", mins_ago)
        };
        spans.push(Span::styled(freshness, Style::default().fg(Color::DarkGray)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
