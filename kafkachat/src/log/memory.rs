//! In-process log for testing.
//!
//! [`MemoryLog`] keeps every topic as a single ordered partition and models
//! consumer groups the way Kafka does: a group that has committed an offset
//! resumes there, a group without one starts where its [`ReplayFrom`] says.
//! Consumers commit after every record they hand out.
//!
//! Test hooks let callers inject raw values, broker errors and producer
//! failures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{GroupId, LogBroker, LogConsumer, LogError, LogProducer, Polled, Record, ReplayFrom};

/// One stored entry of a topic.
#[derive(Debug, Clone)]
enum Entry {
    Record(Record),
    Error(String),
}

#[derive(Debug, Default)]
struct State {
    topics: HashMap<String, Vec<Entry>>,
    /// Committed next-read position per (group, topic).
    committed: HashMap<(String, String), usize>,
    /// Number of poll calls per group.
    polls: HashMap<String, usize>,
    /// When set, every produce fails with this reason.
    produce_failure: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    appended: Notify,
}

/// Shared in-memory log. Cloning yields another handle to the same log.
///
/// # Example
///
/// ```rust,no_run
/// use kafkachat::log::memory::MemoryLog;
/// use kafkachat::log::{GroupId, LogBroker, LogConsumer, LogProducer, Polled, ReplayFrom};
/// use std::time::Duration;
///
/// # async fn example() {
/// let log = MemoryLog::new();
/// log.producer().unwrap().produce("chat", "alice", b"{}").await.unwrap();
///
/// let mut consumer = log.consumer(&GroupId::fresh(), ReplayFrom::Earliest).unwrap();
/// consumer.subscribe("chat").unwrap();
/// assert!(matches!(consumer.poll(Duration::from_millis(10)).await, Polled::Record(_)));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    shared: Arc<Shared>,
}

impl MemoryLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw record, bypassing the producer (e.g. a foreign writer).
    pub fn inject_raw(&self, topic: &str, key: Option<&str>, value: Option<Vec<u8>>) {
        self.push(topic, |offset| {
            Entry::Record(Record {
                key: key.map(str::to_string),
                value,
                partition: 0,
                offset,
            })
        });
    }

    /// Append an entry that surfaces as a broker error when polled.
    pub fn inject_error(&self, topic: &str, reason: impl Into<String>) {
        let reason = reason.into();
        self.push(topic, |_| Entry::Error(reason));
    }

    /// Make every subsequent produce fail (`Some`) or succeed again (`None`).
    pub fn fail_produce(&self, reason: Option<&str>) {
        self.shared.state.lock().produce_failure = reason.map(str::to_string);
    }

    /// All records currently stored in `topic`, in order.
    #[must_use]
    pub fn records(&self, topic: &str) -> Vec<Record> {
        let state = self.shared.state.lock();
        state
            .topics
            .get(topic)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| match e {
                        Entry::Record(r) => Some(r.clone()),
                        Entry::Error(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of times consumers of `group` have polled.
    #[must_use]
    pub fn poll_count(&self, group: &GroupId) -> usize {
        self.shared
            .state
            .lock()
            .polls
            .get(group.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Committed position of `group` on `topic`, if any.
    #[must_use]
    pub fn committed(&self, group: &GroupId, topic: &str) -> Option<usize> {
        self.shared
            .state
            .lock()
            .committed
            .get(&(group.as_str().to_string(), topic.to_string()))
            .copied()
    }

    fn push(&self, topic: &str, make: impl FnOnce(i64) -> Entry) {
        {
            let mut state = self.shared.state.lock();
            let entries = state.topics.entry(topic.to_string()).or_default();
            let offset = i64::try_from(entries.len()).unwrap_or(i64::MAX);
            entries.push(make(offset));
        }
        self.shared.appended.notify_waiters();
    }
}

impl LogBroker for MemoryLog {
    type Producer = MemoryProducer;
    type Consumer = MemoryConsumer;

    fn producer(&self) -> Result<MemoryProducer, LogError> {
        Ok(MemoryProducer { log: self.clone() })
    }

    fn consumer(&self, group: &GroupId, replay: ReplayFrom) -> Result<MemoryConsumer, LogError> {
        Ok(MemoryConsumer {
            log: self.clone(),
            group: group.clone(),
            replay,
            topic: None,
            position: 0,
        })
    }
}

/// Producer handle for a [`MemoryLog`].
#[derive(Debug, Clone)]
pub struct MemoryProducer {
    log: MemoryLog,
}

impl LogProducer for MemoryProducer {
    async fn produce(&self, topic: &str, key: &str, value: &[u8]) -> Result<(), LogError> {
        let failure = self.log.shared.state.lock().produce_failure.clone();
        if let Some(reason) = failure {
            return Err(LogError::Delivery(reason));
        }
        self.log.inject_raw(topic, Some(key), Some(value.to_vec()));
        Ok(())
    }
}

/// Consumer handle for a [`MemoryLog`].
#[derive(Debug)]
pub struct MemoryConsumer {
    log: MemoryLog,
    group: GroupId,
    replay: ReplayFrom,
    topic: Option<String>,
    position: usize,
}

impl MemoryConsumer {
    /// Take the next entry if one is available, committing the new position.
    fn take_next(&mut self) -> Option<Polled> {
        let topic = self.topic.clone()?;
        let mut state = self.log.shared.state.lock();
        let entry = state.topics.get(&topic)?.get(self.position)?.clone();
        self.position += 1;
        state
            .committed
            .insert((self.group.as_str().to_string(), topic), self.position);
        Some(match entry {
            Entry::Record(record) => Polled::Record(record),
            Entry::Error(reason) => Polled::Error(LogError::Broker(reason)),
        })
    }
}

impl LogConsumer for MemoryConsumer {
    fn subscribe(&mut self, topic: &str) -> Result<(), LogError> {
        let state = self.log.shared.state.lock();
        let len = state.topics.get(topic).map_or(0, Vec::len);
        let committed = state
            .committed
            .get(&(self.group.as_str().to_string(), topic.to_string()))
            .copied();

        self.position = committed.unwrap_or(match self.replay {
            ReplayFrom::Earliest | ReplayFrom::SavedOffset => 0,
            ReplayFrom::Latest => len,
        });
        self.topic = Some(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Polled {
        if self.topic.is_none() {
            return Polled::Error(LogError::NotSubscribed);
        }
        *self
            .log
            .shared
            .state
            .lock()
            .polls
            .entry(self.group.as_str().to_string())
            .or_default() += 1;

        if let Some(polled) = self.take_next() {
            return polled;
        }

        let shared = Arc::clone(&self.log.shared);
        let appended = shared.appended.notified();
        // Re-check after registering interest so an append in between is not missed.
        if let Some(polled) = self.take_next() {
            return polled;
        }
        if tokio::time::timeout(timeout, appended).await.is_err() {
            return Polled::Empty;
        }
        self.take_next().unwrap_or(Polled::Empty)
    }
}
