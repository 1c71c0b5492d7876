//! Chat layer for `KafkaChat`.
//!
//! Sits between the log backend and the UI:
//! - [`publish::Publisher`] encodes envelopes and waits for delivery
//! - [`subscribe::Subscriber`] turns records into transcript lines
//! - [`session::ChatSession`] ties both to one user and topic

pub mod line;
pub mod publish;
pub mod session;
pub mod subscribe;

use std::time::Duration;

use kafkachat_proto::codec::CodecError;

use crate::crypto::CryptoError;
use crate::log::LogError;

pub use line::{Body, HistoryLine};
pub use session::{ChatSession, Session, SessionOptions, Started};
pub use subscribe::{FeedEvent, LoopExit};

/// Errors that can occur when publishing a message.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The envelope could not be serialized.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The body could not be sealed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The log rejected the record.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// No delivery confirmation arrived in time.
    #[error("delivery not confirmed within {0:?}")]
    Timeout(Duration),
}

/// Errors that can occur when starting or leaving a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The user name is empty.
    #[error("user name must not be empty")]
    EmptyUser,

    /// The topic name is empty.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// A log client could not be created.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// An announcement could not be published.
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}
