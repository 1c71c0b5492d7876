//! Terminal UI rendering.

pub mod history_panel;
pub mod status_bar;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::app::App;

/// Window title.
pub const TITLE: &str = "Chat With Kafka";

/// Main draw function for the entire UI.
pub fn draw(frame: &mut Frame, app: &App) {
    // Header, history + input, status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);
    history_panel::render(frame, chunks[1], app);
    status_bar::render(frame, chunks[2], app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let header = Line::from(vec![
        Span::styled(TITLE, theme::highlighted()),
        Span::raw("  "),
        Span::styled(format!("{}@{}", app.user, app.topic), theme::dimmed()),
    ]);
    frame.render_widget(Paragraph::new(header), area);
}
