//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::App;

const HELP: &str = "Enter: send | ↑↓ PgUp/PgDn: scroll | Esc: quit";

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let lock = if app.encrypted { "encrypted" } else { "plaintext" };

    let status_line = Line::from(vec![
        Span::styled(
            concat!("KafkaChat v", env!("CARGO_PKG_VERSION")),
            theme::bold(),
        ),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(theme::feed_color(&app.feed_status))),
        Span::raw(format!(" {}", app.feed_status.label())),
        Span::raw(" | "),
        Span::raw(lock),
        Span::raw(" | "),
        Span::styled(HELP, theme::dimmed()),
    ]);

    let paragraph = Paragraph::new(status_line).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
