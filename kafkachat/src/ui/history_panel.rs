//! History pane and input box.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::theme;
use crate::app::App;
use crate::chat::HistoryLine;

/// Render the history pane above the input box.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    render_history(frame, chunks[0], app);
    render_input(frame, chunks[1], app);
}

/// Index range of the lines that fit in `height` rows.
///
/// `scroll_from_bottom` counts lines hidden below the window.
#[must_use]
pub fn visible_window(len: usize, height: usize, scroll_from_bottom: usize) -> (usize, usize) {
    let end = len.saturating_sub(scroll_from_bottom);
    (end.saturating_sub(height), end)
}

fn render_history(frame: &mut Frame, area: Rect, app: &App) {
    let height = usize::from(area.height.saturating_sub(2));
    let (start, end) = visible_window(app.history.len(), height, app.scroll_from_bottom);

    let items: Vec<ListItem> = app.history[start..end]
        .iter()
        .map(|line| ListItem::new(styled(line)))
        .collect();

    let title = if app.scroll_from_bottom > 0 {
        format!("History (+{} below)", app.scroll_from_bottom)
    } else {
        "History".to_string()
    };
    let block = Block::default().title(title).borders(Borders::ALL);

    frame.render_widget(List::new(items).block(block), area);
}

fn styled(line: &HistoryLine) -> Line<'_> {
    let style = if line.is_error() {
        theme::error()
    } else {
        theme::normal()
    };
    match line {
        HistoryLine::Message { time, user, body } => Line::from(vec![
            Span::styled(time.as_str(), theme::timestamp()),
            Span::raw(" "),
            Span::styled(user.as_str(), theme::normal().fg(theme::sender_color(user))),
            Span::raw(": "),
            Span::styled(body.to_string(), style),
        ]),
        HistoryLine::Notice(text) => Line::from(Span::styled(text.as_str(), theme::notice())),
        HistoryLine::DecodeError { .. } | HistoryLine::BrokerError(_) => {
            Line::from(Span::styled(line.to_string(), style))
        }
    }
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let mut display_text = app.input.clone();
    let at = display_text
        .char_indices()
        .nth(app.cursor_position)
        .map_or(display_text.len(), |(i, _)| i);
    display_text.insert(at, '█');

    let input_line = if app.input.is_empty() {
        Line::from(vec![
            Span::styled("█", theme::normal()),
            Span::styled(" Type a message...", theme::dimmed()),
        ])
    } else {
        Line::from(Span::styled(display_text, theme::normal()))
    };

    let block = Block::default()
        .title("Message")
        .borders(Borders::ALL)
        .border_style(theme::highlighted());

    frame.render_widget(Paragraph::new(input_line).block(block), area);
}
