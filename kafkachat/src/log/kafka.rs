//! Apache Kafka backend built on rdkafka.
//!
//! Connection settings (`kafkaconf`) are passed through to librdkafka
//! untouched; this module only adds the keys the chat protocol depends on:
//! the group id, the offset reset policy and whether offsets are committed.
//!
//! librdkafka's own log lines and error callbacks are forwarded into
//! `tracing` under the `kafkachat::broker` target by [`TracingContext`].

use std::collections::BTreeMap;
use std::time::Duration;

use rdkafka::ClientContext;
use rdkafka::config::{ClientConfig as KafkaConfig, RDKafkaLogLevel};
use rdkafka::consumer::{Consumer, ConsumerContext, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::metadata::MetadataPartition;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};

use super::{GroupId, LogBroker, LogConsumer, LogError, LogProducer, Polled, Record, ReplayFrom};

/// Client context that routes librdkafka diagnostics into `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingContext;

impl ClientContext for TracingContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => {
                tracing::error!(target: "kafkachat::broker", facility = fac, "{log_message}");
            }
            RDKafkaLogLevel::Warning => {
                tracing::warn!(target: "kafkachat::broker", facility = fac, "{log_message}");
            }
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                tracing::info!(target: "kafkachat::broker", facility = fac, "{log_message}");
            }
            RDKafkaLogLevel::Debug => {
                tracing::debug!(target: "kafkachat::broker", facility = fac, "{log_message}");
            }
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        tracing::error!(target: "kafkachat::broker", error = %error, reason, "kafka client error");
    }
}

impl ConsumerContext for TracingContext {}

/// Parse a librdkafka verbosity name (`error`, `warn`, `info`, `debug`, ...).
///
/// Unknown names fall back to `warning`.
#[must_use]
pub fn parse_log_level(name: &str) -> RDKafkaLogLevel {
    match name.trim().to_ascii_lowercase().as_str() {
        "emerg" | "emergency" => RDKafkaLogLevel::Emerg,
        "alert" => RDKafkaLogLevel::Alert,
        "crit" | "critical" => RDKafkaLogLevel::Critical,
        "error" => RDKafkaLogLevel::Error,
        "notice" => RDKafkaLogLevel::Notice,
        "info" => RDKafkaLogLevel::Info,
        "debug" | "trace" => RDKafkaLogLevel::Debug,
        _ => RDKafkaLogLevel::Warning,
    }
}

/// Longest slice of the delivery timeout kept back from librdkafka.
const DELIVERY_MARGIN: Duration = Duration::from_millis(500);

/// `message.timeout.ms` for a publisher that gives up after `delivery`.
///
/// librdkafka must expire a record before the publisher stops waiting, or a
/// record reported as unsent can still be delivered later.
#[must_use]
pub fn broker_message_timeout(delivery: Duration) -> Duration {
    let margin = (delivery / 10).min(DELIVERY_MARGIN);
    delivery
        .saturating_sub(margin)
        .max(Duration::from_millis(1))
}

/// Kafka cluster handle: creates producers and consumers from shared settings.
#[derive(Debug, Clone)]
pub struct KafkaLog {
    settings: BTreeMap<String, String>,
    log_level: RDKafkaLogLevel,
    delivery_timeout: Duration,
}

impl KafkaLog {
    /// Create a handle from opaque librdkafka settings.
    #[must_use]
    pub fn new(
        settings: BTreeMap<String, String>,
        log_level: &str,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            settings,
            log_level: parse_log_level(log_level),
            delivery_timeout,
        }
    }

    fn base_config(&self) -> KafkaConfig {
        let mut config = KafkaConfig::new();
        for (key, value) in &self.settings {
            config.set(key, value);
        }
        config.set_log_level(self.log_level);
        config
    }

    /// Librdkafka settings for the producer.
    fn producer_config(&self) -> KafkaConfig {
        let mut config = self.base_config();
        if !self.settings.contains_key("message.timeout.ms") {
            config.set(
                "message.timeout.ms",
                broker_message_timeout(self.delivery_timeout)
                    .as_millis()
                    .to_string(),
            );
        }
        config
    }

    /// Librdkafka settings for a consumer of `group` starting at `replay`.
    fn consumer_config(&self, group: &GroupId, replay: ReplayFrom) -> KafkaConfig {
        let mut config = self.base_config();
        config
            .set("group.id", group.as_str())
            .set(
                "auto.offset.reset",
                match replay {
                    ReplayFrom::Latest => "latest",
                    ReplayFrom::Earliest | ReplayFrom::SavedOffset => "earliest",
                },
            )
            .set(
                "enable.auto.commit",
                if replay.uses_saved_group() {
                    "true"
                } else {
                    "false"
                },
            )
            .set("enable.partition.eof", "false");
        config
    }
}

impl LogBroker for KafkaLog {
    type Producer = KafkaProducer;
    type Consumer = KafkaConsumer;

    fn producer(&self) -> Result<KafkaProducer, LogError> {
        let config = self.producer_config();
        let inner: FutureProducer<TracingContext> = config
            .create_with_context(TracingContext)
            .map_err(|e| LogError::Config(e.to_string()))?;
        tracing::debug!("kafka producer created");
        Ok(KafkaProducer {
            inner,
            timeout: self.delivery_timeout,
        })
    }

    fn consumer(&self, group: &GroupId, replay: ReplayFrom) -> Result<KafkaConsumer, LogError> {
        let inner: StreamConsumer<TracingContext> = self
            .consumer_config(group, replay)
            .create_with_context(TracingContext)
            .map_err(|e| LogError::Config(e.to_string()))?;
        tracing::debug!(group = %group, replay = %replay, "kafka consumer created");
        Ok(KafkaConsumer {
            inner,
            topic: None,
            replay,
            metadata_timeout: self.delivery_timeout,
        })
    }
}

/// Producer that resolves only after the broker's delivery report.
pub struct KafkaProducer {
    inner: FutureProducer<TracingContext>,
    timeout: Duration,
}

impl LogProducer for KafkaProducer {
    async fn produce(&self, topic: &str, key: &str, value: &[u8]) -> Result<(), LogError> {
        let record = FutureRecord::to(topic).key(key).payload(value);
        match self.inner.send(record, Timeout::After(self.timeout)).await {
            Ok(_) => Ok(()),
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut), _)) => {
                Err(LogError::Timeout)
            }
            Err((e, _)) => Err(LogError::Delivery(e.to_string())),
        }
    }
}

/// Consumer polling one topic through a [`StreamConsumer`].
pub struct KafkaConsumer {
    inner: StreamConsumer<TracingContext>,
    topic: Option<String>,
    replay: ReplayFrom,
    metadata_timeout: Duration,
}

impl KafkaConsumer {
    /// Current end offset of every partition of `topic`.
    ///
    /// Blocks for up to the metadata timeout per request.
    fn end_offsets(&self, topic: &str) -> Result<Vec<(i32, i64)>, LogError> {
        let metadata = self
            .inner
            .fetch_metadata(Some(topic), self.metadata_timeout)
            .map_err(|e| LogError::Broker(e.to_string()))?;
        let partitions: Vec<i32> = metadata
            .topics()
            .iter()
            .filter(|t| t.name() == topic)
            .flat_map(|t| t.partitions().iter().map(MetadataPartition::id))
            .collect();

        let mut ends = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let (_, high) = self
                .inner
                .fetch_watermarks(topic, partition, self.metadata_timeout)
                .map_err(|e| LogError::Broker(e.to_string()))?;
            ends.push((partition, high));
        }
        Ok(ends)
    }
}

/// Assignment reading `topic` from the given `(partition, offset)` pairs.
///
/// # Errors
///
/// Returns [`LogError::Broker`] if librdkafka rejects a partition entry.
pub fn assignment_at(topic: &str, ends: &[(i32, i64)]) -> Result<TopicPartitionList, LogError> {
    let mut list = TopicPartitionList::with_capacity(ends.len());
    for &(partition, offset) in ends {
        list.add_partition_offset(topic, partition, Offset::Offset(offset))
            .map_err(|e| LogError::Broker(e.to_string()))?;
    }
    Ok(list)
}

impl LogConsumer for KafkaConsumer {
    /// Join `topic`.
    ///
    /// Group subscriptions resolve their start offset only once partitions
    /// are assigned, during a later poll. A `latest` consumer therefore pins
    /// the end offsets now and assigns them directly, so records produced
    /// after this returns are read. A topic with no known partitions yet
    /// falls back to a group subscription.
    fn subscribe(&mut self, topic: &str) -> Result<(), LogError> {
        let ends = if self.replay == ReplayFrom::Latest {
            self.end_offsets(topic)?
        } else {
            Vec::new()
        };

        if ends.is_empty() {
            self.inner
                .subscribe(&[topic])
                .map_err(|e| LogError::Broker(e.to_string()))?;
        } else {
            self.inner
                .assign(&assignment_at(topic, &ends)?)
                .map_err(|e| LogError::Broker(e.to_string()))?;
            tracing::debug!(topic, partitions = ends.len(), "assigned at end offsets");
        }
        self.topic = Some(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Polled {
        if self.topic.is_none() {
            return Polled::Error(LogError::NotSubscribed);
        }
        match tokio::time::timeout(timeout, self.inner.recv()).await {
            Err(_) => Polled::Empty,
            Ok(Err(e)) => Polled::Error(LogError::Broker(e.to_string())),
            Ok(Ok(msg)) => Polled::Record(Record {
                key: msg.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                value: msg.payload().map(<[u8]>::to_vec),
                partition: msg.partition(),
                offset: msg.offset(),
            }),
        }
    }
}
