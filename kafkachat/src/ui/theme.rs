//! Colors and styles for the TUI.

use ratatui::style::{Color, Modifier, Style};

use crate::app::FeedStatus;

/// Primary foreground color.
pub const FG_PRIMARY: Color = Color::White;

/// Secondary foreground color (dimmed text).
pub const FG_SECONDARY: Color = Color::Gray;

/// Accent for the header and the input border.
pub const HIGHLIGHT: Color = Color::Cyan;

/// Error lines and a stopped feed.
pub const ERROR: Color = Color::Red;

/// Palette for sender names.
pub const SENDER_COLORS: [Color; 10] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::LightCyan,
    Color::LightGreen,
    Color::LightYellow,
    Color::LightBlue,
    Color::Rgb(255, 165, 0),
];

/// Normal text style.
#[must_use]
pub fn normal() -> Style {
    Style::default().fg(FG_PRIMARY)
}

/// Dimmed text style (help text, placeholders).
#[must_use]
pub fn dimmed() -> Style {
    Style::default().fg(FG_SECONDARY)
}

/// Bold text style.
#[must_use]
pub fn bold() -> Style {
    Style::default().fg(FG_PRIMARY).add_modifier(Modifier::BOLD)
}

/// Highlighted style (header title, input border).
#[must_use]
pub fn highlighted() -> Style {
    Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD)
}

/// Style for decode errors, placeholders and broker errors.
#[must_use]
pub fn error() -> Style {
    Style::default().fg(ERROR)
}

/// Style for local notices (italic, dim blue).
#[must_use]
pub fn notice() -> Style {
    Style::default()
        .fg(Color::Rgb(100, 140, 180))
        .add_modifier(Modifier::ITALIC)
}

/// Style for timestamps (dark gray).
#[must_use]
pub fn timestamp() -> Style {
    Style::default().fg(Color::Rgb(120, 120, 120))
}

/// Status bar background.
#[must_use]
pub fn status_bar_bg() -> Style {
    Style::default().fg(Color::White).bg(Color::Rgb(30, 30, 50))
}

/// Dot color for the feed status indicator.
#[must_use]
pub const fn feed_color(status: &FeedStatus) -> Color {
    match status {
        FeedStatus::Connecting => Color::Yellow,
        FeedStatus::Live => Color::Green,
        FeedStatus::Stopped => ERROR,
    }
}

/// Stable color for a sender name.
#[must_use]
pub fn sender_color(name: &str) -> Color {
    let hash = name.bytes().fold(0u32, |acc, b| {
        acc.wrapping_mul(31).wrapping_add(u32::from(b))
    });
    SENDER_COLORS[(hash as usize) % SENDER_COLORS.len()]
}
