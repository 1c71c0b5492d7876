//! Session controller: wires the publisher and subscriber for one user.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use kafkachat_proto::clock;
use kafkachat_proto::envelope::{Envelope, JOIN_ANNOUNCEMENT, LEAVE_ANNOUNCEMENT};

use crate::config::ChatConfig;
use crate::crypto::keys::SymmetricKey;
use crate::crypto::{BodyCipher, cipher_for};
use crate::log::{GroupId, LogBroker, LogProducer, ReplayFrom};

use super::line::{Body, HistoryLine};
use super::publish::Publisher;
use super::subscribe::{FeedEvent, LoopExit, Subscriber};
use super::{PublishError, SessionError};

/// Identity of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Topic read and written.
    pub topic: String,
    /// Display name stamped on outgoing envelopes.
    pub user: String,
    /// Consumer group of this session's subscription.
    pub group_id: GroupId,
    /// Where the subscription started.
    pub replay: ReplayFrom,
}

/// Everything needed to start a session.
#[derive(Clone)]
pub struct SessionOptions {
    /// Topic to join.
    pub topic: String,
    /// Display name.
    pub user: String,
    /// Replay mode for the subscription.
    pub replay: ReplayFrom,
    /// Stable group id for [`ReplayFrom::SavedOffset`].
    pub group_id: Option<String>,
    /// Body key; `None` sends plaintext.
    pub key: Option<SymmetricKey>,
    /// Timeouts and channel sizing.
    pub chat: ChatConfig,
}

impl SessionOptions {
    /// Options with defaults for everything but topic and user.
    pub fn new(topic: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            user: user.into(),
            replay: ReplayFrom::default(),
            group_id: None,
            key: None,
            chat: ChatConfig::default(),
        }
    }

    /// The group the subscription will use.
    ///
    /// Saved-offset replay needs the same group every run; every other mode
    /// gets a group that has never committed anything.
    fn group(&self) -> GroupId {
        if self.replay.uses_saved_group() {
            self.group_id.as_ref().map_or_else(
                || GroupId::new(format!("kafkachat-{}", self.user)),
                GroupId::new,
            )
        } else {
            GroupId::fresh()
        }
    }
}

/// A started session plus the outputs of startup.
pub struct Started<P: LogProducer> {
    /// The running session.
    pub session: ChatSession<P>,
    /// Lines and status from the subscriber loop.
    pub feed: mpsc::Receiver<FeedEvent>,
    /// Local echo of the join announcement, or why it failed to send.
    pub joined: Result<HistoryLine, PublishError>,
}

/// A joined chat: publishes the user's lines and owns the subscriber task.
pub struct ChatSession<P: LogProducer> {
    session: Session,
    cipher: Arc<dyn BodyCipher>,
    publisher: Publisher<P>,
    subscriber: Option<JoinHandle<LoopExit>>,
}

impl<P: LogProducer + 'static> ChatSession<P> {
    /// Join `opts.topic` on `broker`.
    ///
    /// The subscriber is running before the join announcement is sent, so
    /// with earliest replay the user sees their own announcement. A failed
    /// announcement does not fail startup; it is returned in
    /// [`Started::joined`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] for an empty user or topic, or if the log
    /// clients cannot be created.
    pub async fn start<B>(broker: &B, opts: SessionOptions) -> Result<Started<P>, SessionError>
    where
        B: LogBroker<Producer = P>,
    {
        if opts.user.trim().is_empty() {
            return Err(SessionError::EmptyUser);
        }
        if opts.topic.trim().is_empty() {
            return Err(SessionError::EmptyTopic);
        }

        let group_id = opts.group();
        let cipher = cipher_for(opts.key.clone());

        let consumer = broker.consumer(&group_id, opts.replay)?;
        let (feed, handle) = Subscriber::new(
            consumer,
            opts.topic.clone(),
            group_id.clone(),
            Arc::clone(&cipher),
            opts.chat.poll_timeout,
        )
        .spawn(opts.chat.feed_capacity);

        let producer = match broker.producer() {
            Ok(producer) => producer,
            Err(e) => {
                handle.abort();
                return Err(e.into());
            }
        };

        tracing::info!(
            topic = %opts.topic,
            user = %opts.user,
            group = %group_id,
            replay = %opts.replay,
            encrypted = cipher.is_sealing(),
            "session started"
        );

        let session = Self {
            publisher: Publisher::new(producer, opts.topic.clone(), opts.chat.delivery_timeout),
            session: Session {
                topic: opts.topic,
                user: opts.user,
                group_id,
                replay: opts.replay,
            },
            cipher,
            subscriber: Some(handle),
        };
        let joined = session.announce(JOIN_ANNOUNCEMENT).await;

        Ok(Started {
            session,
            feed,
            joined,
        })
    }

    /// Send one line typed by the user.
    ///
    /// Whitespace-only input is ignored and yields `Ok(None)`. On success
    /// the local echo line is returned once the log has confirmed the
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if sealing, encoding or delivery fails.
    pub async fn submit(&self, text: &str) -> Result<Option<HistoryLine>, PublishError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.announce(text).await.map(Some)
    }

    /// Send the leave announcement and stop the subscriber.
    ///
    /// The subscriber is stopped even when the announcement fails.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Publish`] if the announcement was not delivered.
    pub async fn leave(mut self) -> Result<(), SessionError> {
        let result = self.announce(LEAVE_ANNOUNCEMENT).await;
        if let Some(handle) = self.subscriber.take() {
            handle.abort();
        }
        tracing::info!(topic = %self.session.topic, user = %self.session.user, "session closed");
        result.map(|_| ()).map_err(SessionError::from)
    }

    /// Leave the chat once the UI loop has ended, however it ended.
    ///
    /// A failed leave announcement is logged; `outcome` is returned as is.
    pub async fn finish<T>(self, outcome: T) -> T {
        if let Err(e) = self.leave().await {
            tracing::warn!(error = %e, "leave announcement failed");
        }
        outcome
    }

    /// Session identity.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns `true` if message bodies are sealed.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_sealing()
    }

    async fn announce(&self, text: &str) -> Result<HistoryLine, PublishError> {
        let envelope = Envelope::now(text, self.session.user.clone());
        let sealed = envelope.clone().with_message(self.cipher.seal(text)?);
        self.publisher.send(&sealed).await?;

        let time = clock::to_local_display(&envelope.time).unwrap_or_else(|_| envelope.time.clone());
        Ok(HistoryLine::Message {
            time,
            user: envelope.user,
            body: Body::Plain(envelope.message),
        })
    }
}

impl<P: LogProducer> Drop for ChatSession<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.subscriber.take() {
            handle.abort();
        }
    }
}
