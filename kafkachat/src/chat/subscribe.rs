//! Subscriber loop: log records in, ready-to-render transcript lines out.
//!
//! The loop runs on its own task and never touches the transcript. It turns
//! every record into a [`HistoryLine`] and forwards it as a [`FeedEvent`]
//! over a bounded channel that the UI drains on each redraw tick.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use kafkachat_proto::{clock, codec};

use crate::crypto::BodyCipher;
use crate::log::{GroupId, LogConsumer, LogError, Polled, Record};

use super::line::{Body, HistoryLine};

/// Event delivered from the subscriber loop to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The subscription is active.
    Subscribed {
        /// Topic being read.
        topic: String,
        /// Group the subscription belongs to.
        group: String,
    },
    /// A new transcript line.
    Line(HistoryLine),
    /// The subscription ended with a broker error. Always the last event.
    Terminated {
        /// Broker diagnostic.
        reason: String,
    },
}

/// Why the subscriber loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The log reported an error; the UI was told once.
    BrokerError(String),
    /// The receiving side of the feed was dropped.
    UiClosed,
}

/// Loop state, reported through tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Subscribing,
    Polling,
    Idle,
    Terminated,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Subscribing => "subscribing",
            Self::Polling => "polling",
            Self::Idle => "idle",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Render a record as a transcript line, with times shown in `tz`.
///
/// Tombstones, undecodable values and unparseable timestamps all become a
/// [`HistoryLine::DecodeError`]. A body that does not open becomes a
/// message with an [`Body::Undecryptable`] body.
pub fn render_record_in<Tz>(record: &Record, cipher: &dyn BodyCipher, tz: &Tz) -> HistoryLine
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let Some(value) = record.value.as_deref() else {
        return HistoryLine::DecodeError {
            raw: String::new(),
            reason: "record has no value".to_string(),
        };
    };

    let envelope = match codec::decode(value) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(offset = record.offset, error = %e, "undecodable record");
            return HistoryLine::DecodeError {
                raw: String::from_utf8_lossy(value).into_owned(),
                reason: e.to_string(),
            };
        }
    };

    let time = match clock::to_display_in(&envelope.time, tz) {
        Ok(time) => time,
        Err(e) => {
            tracing::debug!(offset = record.offset, error = %e, "record has a bad timestamp");
            return HistoryLine::DecodeError {
                raw: String::from_utf8_lossy(value).into_owned(),
                reason: e.to_string(),
            };
        }
    };

    let body = match cipher.open(&envelope.message) {
        Ok(text) => Body::Plain(text),
        Err(e) => {
            tracing::debug!(offset = record.offset, user = %envelope.user, error = %e, "body did not open");
            Body::Undecryptable(envelope.message)
        }
    };

    HistoryLine::Message {
        time,
        user: envelope.user,
        body,
    }
}

/// Render a record with times in the host's local zone.
pub fn render_record(record: &Record, cipher: &dyn BodyCipher) -> HistoryLine {
    render_record_in(record, cipher, &Local)
}

/// Drives one consumer until the log fails or the UI goes away.
pub struct Subscriber<C: LogConsumer> {
    consumer: C,
    topic: String,
    group: GroupId,
    cipher: Arc<dyn BodyCipher>,
    poll_timeout: Duration,
}

impl<C: LogConsumer + 'static> Subscriber<C> {
    /// Create a subscriber for `topic`. Nothing is read until [`run`](Self::run).
    pub fn new(
        consumer: C,
        topic: impl Into<String>,
        group: GroupId,
        cipher: Arc<dyn BodyCipher>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            consumer,
            topic: topic.into(),
            group,
            cipher,
            poll_timeout,
        }
    }

    /// Spawn the loop on the runtime, returning the feed and the task handle.
    ///
    /// The subscription is made before this returns. Backends pin a
    /// `latest` start position at that point, so records produced afterwards
    /// are not skipped.
    pub fn spawn(mut self, capacity: usize) -> (mpsc::Receiver<FeedEvent>, JoinHandle<LoopExit>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscribed = self.subscribe();
        let handle = tokio::spawn(self.drive(tx, subscribed));
        (rx, handle)
    }

    /// Run the loop on the current task.
    ///
    /// After a broker error exactly one [`FeedEvent::Terminated`] is sent and
    /// the consumer is not polled again.
    pub async fn run(mut self, tx: mpsc::Sender<FeedEvent>) -> LoopExit {
        let subscribed = self.subscribe();
        self.drive(tx, subscribed).await
    }

    fn subscribe(&mut self) -> Result<(), LogError> {
        let state = LoopState::Subscribing;
        tracing::debug!(topic = %self.topic, group = %self.group, %state, "subscriber starting");
        self.consumer.subscribe(&self.topic)
    }

    async fn drive(
        mut self,
        tx: mpsc::Sender<FeedEvent>,
        subscribed: Result<(), LogError>,
    ) -> LoopExit {
        if let Err(e) = subscribed {
            return terminate(&tx, &self.topic, &self.group, e.to_string()).await;
        }
        let mut state = LoopState::Subscribing;
        tracing::info!(topic = %self.topic, group = %self.group, "subscribed");
        if tx
            .send(FeedEvent::Subscribed {
                topic: self.topic.clone(),
                group: self.group.to_string(),
            })
            .await
            .is_err()
        {
            return LoopExit::UiClosed;
        }

        loop {
            match self.consumer.poll(self.poll_timeout).await {
                Polled::Empty => {
                    if state != LoopState::Idle {
                        state = LoopState::Idle;
                        tracing::trace!(%state, "no records");
                    }
                    if tx.is_closed() {
                        tracing::debug!("feed closed, subscriber stopping");
                        return LoopExit::UiClosed;
                    }
                }
                Polled::Error(e) => {
                    return terminate(&tx, &self.topic, &self.group, e.to_string()).await;
                }
                Polled::Record(record) => {
                    if state != LoopState::Polling {
                        state = LoopState::Polling;
                        tracing::trace!(%state, "records arriving");
                    }
                    let line = render_record(&record, self.cipher.as_ref());
                    if tx.send(FeedEvent::Line(line)).await.is_err() {
                        tracing::debug!("feed closed, subscriber stopping");
                        return LoopExit::UiClosed;
                    }
                }
            }
            tokio::task::yield_now().await;
        }
    }
}

async fn terminate(
    tx: &mpsc::Sender<FeedEvent>,
    topic: &str,
    group: &GroupId,
    reason: String,
) -> LoopExit {
    let state = LoopState::Terminated;
    tracing::error!(topic, group = %group, %state, reason = %reason, "subscription failed");
    // The UI may already be gone; the loop ends either way.
    let _ = tx
        .send(FeedEvent::Terminated {
            reason: reason.clone(),
        })
        .await;
    LoopExit::BrokerError(reason)
}
