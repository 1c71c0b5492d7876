//! Append-only log abstraction for `KafkaChat`.
//!
//! Defines the traits every log backend must satisfy. Concrete backends:
//! - [`memory::MemoryLog`]: in-process log for tests and local runs
//! - `kafka::KafkaLog`: Apache Kafka via rdkafka (feature `kafka`)
//!
//! The log carries opaque record values. Encoding and sealing happen above
//! this layer.

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Identity used for subscription bookkeeping (a consumer group id).
///
/// A fresh id per session means the log holds no committed offsets for it,
/// which is what makes every session replay from the configured start.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId(String);

impl GroupId {
    /// Generate a random, never-before-used group id.
    #[must_use]
    pub fn fresh() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create a group id from a fixed string (used for saved-offset replay).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the string representation of this group id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a subscription starts reading when its group has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplayFrom {
    /// Fresh group, start at the first retained record (full history).
    #[default]
    Earliest,
    /// Fresh group, start after the last record present at join time.
    Latest,
    /// Stable group, resume from its committed offset.
    SavedOffset,
}

impl ReplayFrom {
    /// Whether this mode needs a stable group id instead of a fresh one.
    #[must_use]
    pub const fn uses_saved_group(self) -> bool {
        matches!(self, Self::SavedOffset)
    }
}

impl fmt::Display for ReplayFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Earliest => write!(f, "earliest"),
            Self::Latest => write!(f, "latest"),
            Self::SavedOffset => write!(f, "saved-offset"),
        }
    }
}

impl FromStr for ReplayFrom {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            "saved-offset" | "saved_offset" => Ok(Self::SavedOffset),
            other => Err(format!(
                "unknown replay mode {other:?} (expected earliest, latest or saved-offset)"
            )),
        }
    }
}

/// One record read from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record key (the sender name for records we produce).
    pub key: Option<String>,
    /// Record value; `None` for tombstones.
    pub value: Option<Vec<u8>>,
    /// Partition the record came from.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
}

/// Result of a single bounded poll.
#[derive(Debug)]
pub enum Polled {
    /// Nothing arrived within the timeout.
    Empty,
    /// A record arrived.
    Record(Record),
    /// The log reported an error for this poll.
    Error(LogError),
}

/// Errors reported by a log backend.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The broker or client reported a failure.
    #[error("broker error: {0}")]
    Broker(String),

    /// A produced record was not confirmed by the log.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The operation did not complete in time.
    #[error("log operation timed out")]
    Timeout,

    /// `poll` was called before `subscribe`.
    #[error("consumer is not subscribed to a topic")]
    NotSubscribed,

    /// The backend could not be configured.
    #[error("invalid log configuration: {0}")]
    Config(String),
}

/// Write side of the log.
pub trait LogProducer: Send + Sync {
    /// Append a keyed record to `topic`.
    ///
    /// Resolves only once the log has confirmed the record is stored, so a
    /// consumer started after `Ok(())` is guaranteed to see it.
    fn produce(
        &self,
        topic: &str,
        key: &str,
        value: &[u8],
    ) -> impl std::future::Future<Output = Result<(), LogError>> + Send;
}

/// Read side of the log.
pub trait LogConsumer: Send {
    /// Subscribe to `topic`. Must be called before [`poll`](Self::poll).
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the subscription is rejected.
    fn subscribe(&mut self, topic: &str) -> Result<(), LogError>;

    /// Wait up to `timeout` for the next record.
    fn poll(&mut self, timeout: Duration) -> impl std::future::Future<Output = Polled> + Send;
}

/// Factory for producers and consumers that share one log.
pub trait LogBroker {
    /// Producer type handed to the publisher.
    type Producer: LogProducer + 'static;
    /// Consumer type driven by the subscriber loop.
    type Consumer: LogConsumer + 'static;

    /// Create a producer.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the client cannot be created.
    fn producer(&self) -> Result<Self::Producer, LogError>;

    /// Create a consumer for `group` starting at `replay`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] if the client cannot be created.
    fn consumer(&self, group: &GroupId, replay: ReplayFrom) -> Result<Self::Consumer, LogError>;
}
