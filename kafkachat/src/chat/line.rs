//! Renderable transcript entries.
//!
//! Everything the user sees in the history pane is a [`HistoryLine`]:
//! remote messages, the local echo of our own messages, and the inline
//! error lines that keep the transcript the single error channel.

use std::fmt;

/// Marker shown in place of a body that could not be opened.
pub const UNDECRYPTABLE_MARKER: &str = "[Error decoding message]";

/// The body of a rendered chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Readable text.
    Plain(String),
    /// A sealed token that did not open with our key (or no token at all).
    Undecryptable(String),
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(text) => f.write_str(text),
            Self::Undecryptable(token) => write!(f, "{UNDECRYPTABLE_MARKER} {token}"),
        }
    }
}

/// One line of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryLine {
    /// A chat message, with its time already rendered in local time.
    Message {
        /// Local display time.
        time: String,
        /// Sender name.
        user: String,
        /// Message body.
        body: Body,
    },
    /// A record that could not be decoded.
    DecodeError {
        /// The raw record value, lossily converted to text.
        raw: String,
        /// Decoder diagnostic.
        reason: String,
    },
    /// The subscription failed; no more messages will arrive.
    BrokerError(String),
    /// A local notice (send failures, session state).
    Notice(String),
}

impl HistoryLine {
    /// Returns `true` for lines that report a problem.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        match self {
            Self::Message { body, .. } => matches!(body, Body::Undecryptable(_)),
            Self::DecodeError { .. } | Self::BrokerError(_) => true,
            Self::Notice(_) => false,
        }
    }
}

impl fmt::Display for HistoryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message { time, user, body } => write!(f, "{time} {user}: {body}"),
            Self::DecodeError { raw, .. } => write!(f, "Error decoding message: {raw}"),
            Self::BrokerError(reason) => write!(f, "Consumer error: {reason}"),
            Self::Notice(text) => f.write_str(text),
        }
    }
}
