//! Application state and event handling.
//!
//! [`App`] owns the transcript. Lines reach it from two places only: the
//! UI loop (local echo and notices) and the subscriber feed, which the UI
//! loop drains each tick.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::chat::{FeedEvent, HistoryLine};

/// Lines moved by one PageUp/PageDown.
const PAGE: usize = 10;

/// State of the subscription as far as the UI knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    /// Waiting for the subscriber to report in.
    Connecting,
    /// Subscribed; records are flowing.
    Live,
    /// The subscription ended; no more messages will arrive.
    Stopped,
}

impl FeedStatus {
    /// Short label for the status bar.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Live => "live",
            Self::Stopped => "stopped",
        }
    }
}

/// Main application state.
pub struct App {
    /// Current text input.
    pub input: String,
    /// Cursor position in input (character index).
    pub cursor_position: usize,
    /// Every line shown in the history pane, oldest first.
    pub history: Vec<HistoryLine>,
    /// How many lines the view is scrolled up from the bottom.
    pub scroll_from_bottom: usize,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Subscription state.
    pub feed_status: FeedStatus,
    /// Our display name.
    pub user: String,
    /// Topic being chatted on.
    pub topic: String,
    /// Whether bodies are encrypted.
    pub encrypted: bool,
}

impl App {
    /// Create an empty application for `user` on `topic`.
    pub fn new(user: impl Into<String>, topic: impl Into<String>, encrypted: bool) -> Self {
        Self {
            input: String::new(),
            cursor_position: 0,
            history: Vec::new(),
            scroll_from_bottom: 0,
            should_quit: false,
            feed_status: FeedStatus::Connecting,
            user: user.into(),
            topic: topic.into(),
            encrypted,
        }
    }

    /// Handle a key event.
    ///
    /// Returns the input text when the user submits it. The input is left in
    /// place; the caller clears it with [`clear_input`](Self::clear_input)
    /// once the send succeeded.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<String> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Esc, _) => {
                self.should_quit = true;
                None
            }
            (KeyCode::Enter, _) => {
                if self.input.trim().is_empty() {
                    None
                } else {
                    Some(self.input.clone())
                }
            }
            (KeyCode::Char(c), _) => {
                self.enter_char(c);
                None
            }
            (KeyCode::Backspace, _) => {
                self.delete_char_before();
                None
            }
            (KeyCode::Delete, _) => {
                self.delete_char_at();
                None
            }
            (KeyCode::Left, _) => {
                self.cursor_position = self.cursor_position.saturating_sub(1);
                None
            }
            (KeyCode::Right, _) => {
                self.cursor_position = (self.cursor_position + 1).min(self.input_len());
                None
            }
            (KeyCode::Home, _) => {
                self.cursor_position = 0;
                None
            }
            (KeyCode::End, _) => {
                self.cursor_position = self.input_len();
                None
            }
            (KeyCode::Up, _) => {
                self.scroll_up(1);
                None
            }
            (KeyCode::Down, _) => {
                self.scroll_down(1);
                None
            }
            (KeyCode::PageUp, _) => {
                self.scroll_up(PAGE);
                None
            }
            (KeyCode::PageDown, _) => {
                self.scroll_down(PAGE);
                None
            }
            _ => None,
        }
    }

    /// Append a line to the transcript.
    ///
    /// A view at the bottom follows new lines; a scrolled view stays on the
    /// lines it was showing.
    pub fn push_line(&mut self, line: HistoryLine) {
        self.history.push(line);
        if self.scroll_from_bottom > 0 {
            self.scroll_from_bottom += 1;
        }
    }

    /// Apply one event from the subscriber feed.
    pub fn apply_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Subscribed { .. } => self.feed_status = FeedStatus::Live,
            FeedEvent::Line(line) => self.push_line(line),
            FeedEvent::Terminated { reason } => {
                self.feed_status = FeedStatus::Stopped;
                self.push_line(HistoryLine::BrokerError(reason));
            }
        }
    }

    /// Clear the input after a successful send.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    /// Byte offset of a character index in the input.
    fn byte_index(&self, char_index: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_index)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn enter_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor_position);
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    fn delete_char_before(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    fn delete_char_at(&mut self) {
        if self.cursor_position < self.input_len() {
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
        }
    }

    fn scroll_up(&mut self, lines: usize) {
        let max = self.history.len().saturating_sub(1);
        self.scroll_from_bottom = (self.scroll_from_bottom + lines).min(max);
    }

    const fn scroll_down(&mut self, lines: usize) {
        self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(lines);
    }
}
