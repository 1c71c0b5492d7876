//! The chat envelope exchanged on the topic.
//!
//! One envelope is one record value. The body may be plaintext or an
//! opaque sealed token; the sender name and timestamp always travel in the
//! clear so the log keeps readable metadata.

use serde::{Deserialize, Serialize};

use crate::clock;

/// Announcement body published when a session starts.
pub const JOIN_ANNOUNCEMENT: &str = "Has entered the chat.";

/// Announcement body published when a session shuts down.
pub const LEAVE_ANNOUNCEMENT: &str = "Has left the chat.";

/// A single chat record.
///
/// Field order matches the wire order: `message`, `user`, `time`.
///
/// `time` stays a string here. It is produced by [`clock::now_utc`] on the
/// way out, and only interpreted when a line is rendered, so an envelope
/// with an odd timestamp still decodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message body: plaintext, or a sealed token when a key is configured.
    pub message: String,
    /// Display name of the sender.
    pub user: String,
    /// ISO-8601 timestamp in UTC.
    pub time: String,
}

impl Envelope {
    /// Builds an envelope stamped with the current UTC time.
    #[must_use]
    pub fn now(message: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user: user.into(),
            time: clock::now_utc(),
        }
    }

    /// Returns a copy of this envelope with the body replaced.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}
