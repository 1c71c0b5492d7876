//! Publish side: one envelope in, one confirmed record out.

use std::time::Duration;

use kafkachat_proto::codec;
use kafkachat_proto::envelope::Envelope;

use crate::log::LogProducer;

use super::PublishError;

/// Sends envelopes to a topic, keyed by sender.
///
/// Keying by `user` routes all of one sender's records to the same
/// partition, which keeps each sender's messages in order.
pub struct Publisher<P: LogProducer> {
    producer: P,
    topic: String,
    delivery_timeout: Duration,
}

impl<P: LogProducer> Publisher<P> {
    /// Creates a publisher for `topic`.
    pub fn new(producer: P, topic: impl Into<String>, delivery_timeout: Duration) -> Self {
        Self {
            producer,
            topic: topic.into(),
            delivery_timeout,
        }
    }

    /// The topic this publisher writes to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encode and send one envelope, waiting for the log to confirm it.
    ///
    /// Once this returns `Ok(())` the record is durable: a subscription
    /// started afterwards will see it.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if encoding fails, the log rejects the
    /// record, or no confirmation arrives within the delivery timeout.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), PublishError> {
        let payload = codec::encode(envelope)?;

        let delivery = self
            .producer
            .produce(&self.topic, &envelope.user, payload.as_bytes());
        match tokio::time::timeout(self.delivery_timeout, delivery).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    topic = %self.topic,
                    user = %envelope.user,
                    bytes = payload.len(),
                    "record delivered"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(topic = %self.topic, error = %e, "record delivery failed");
                Err(PublishError::Log(e))
            }
            Err(_) => {
                tracing::warn!(
                    topic = %self.topic,
                    timeout_ms = self.delivery_timeout.as_millis(),
                    "record delivery not confirmed in time"
                );
                Err(PublishError::Timeout(self.delivery_timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::memory::MemoryLog;
    use crate::log::{LogBroker, LogError};

    fn envelope() -> Envelope {
        Envelope {
            message: "hi".into(),
            user: "A".into(),
            time: "2024-01-01T12:00:00.000000+00:00".into(),
        }
    }

    #[tokio::test]
    async fn send_writes_keyed_json_record() {
        let log = MemoryLog::new();
        let publisher = Publisher::new(log.producer().unwrap(), "chat", Duration::from_secs(1));
        publisher.send(&envelope()).await.unwrap();

        let records = log.records("chat");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key.as_deref(), Some("A"));
        assert_eq!(
            records[0].value.as_deref(),
            Some(
                &br#"{"message":"hi","user":"A","time":"2024-01-01T12:00:00.000000+00:00"}"#[..]
            )
        );
    }

    #[tokio::test]
    async fn send_uses_configured_topic() {
        let log = MemoryLog::new();
        let publisher =
            Publisher::new(log.producer().unwrap(), "team-room", Duration::from_secs(1));
        assert_eq!(publisher.topic(), "team-room");
        publisher.send(&envelope()).await.unwrap();
        assert_eq!(log.records("team-room").len(), 1);
        assert!(log.records("chat").is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_surfaced() {
        let log = MemoryLog::new();
        log.fail_produce(Some("not enough replicas"));
        let publisher = Publisher::new(log.producer().unwrap(), "chat", Duration::from_secs(1));
        let result = publisher.send(&envelope()).await;
        assert!(matches!(
            result,
            Err(PublishError::Log(LogError::Delivery(reason))) if reason == "not enough replicas"
        ));
    }

    struct NeverConfirms;

    impl LogProducer for NeverConfirms {
        async fn produce(&self, _topic: &str, _key: &str, _value: &[u8]) -> Result<(), LogError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn missing_confirmation_times_out() {
        let publisher = Publisher::new(NeverConfirms, "chat", Duration::from_millis(20));
        let result = publisher.send(&envelope()).await;
        assert!(matches!(result, Err(PublishError::Timeout(d)) if d == Duration::from_millis(20)));
    }
}
