//! Integration tests for the session controller over the in-memory log.
//!
//! Covers:
//! 1. The two-user plaintext scenario, down to the exact record bytes.
//! 2. A record confirmed by `send` is visible to any later subscription.
//! 3. Join and leave announcements.
//! 4. Publish failures reach the caller and leave the session usable.
//! 5. Encrypted sessions interoperate only with the same key.

use std::time::Duration;

use tokio::sync::mpsc;

use kafkachat::chat::{Body, ChatSession, FeedEvent, HistoryLine, PublishError, SessionOptions};
use kafkachat::crypto::keys::SymmetricKey;
use kafkachat::log::memory::MemoryLog;
use kafkachat::log::{LogError, ReplayFrom};
use kafkachat_proto::codec;
use kafkachat_proto::envelope::{JOIN_ANNOUNCEMENT, LEAVE_ANNOUNCEMENT};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const WAIT: Duration = Duration::from_secs(2);

fn options(user: &str) -> SessionOptions {
    let mut opts = SessionOptions::new("chat", user);
    opts.chat.poll_timeout = Duration::from_millis(5);
    opts
}

/// Wait for the next transcript line, skipping status events.
async fn next_line(feed: &mut mpsc::Receiver<FeedEvent>) -> HistoryLine {
    loop {
        match tokio::time::timeout(WAIT, feed.recv()).await {
            Ok(Some(FeedEvent::Line(line))) => return line,
            Ok(Some(FeedEvent::Subscribed { .. })) => {}
            other => panic!("expected a line, got {other:?}"),
        }
    }
}

fn body_of(line: &HistoryLine) -> (&str, &Body) {
    match line {
        HistoryLine::Message { user, body, .. } => (user.as_str(), body),
        other => panic!("expected a message, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_users_plaintext_scenario() {
    let log = MemoryLog::new();

    let alice = ChatSession::start(&log, options("A")).await.unwrap();
    let mut bob = ChatSession::start(&log, options("B")).await.unwrap();

    let echo = alice.session.submit("hi").await.unwrap().unwrap();
    assert_eq!(body_of(&echo), ("A", &Body::Plain("hi".into())));

    // B replays from earliest: A joined, B joined, then A said hi.
    let expected = [("A", JOIN_ANNOUNCEMENT), ("B", JOIN_ANNOUNCEMENT), ("A", "hi")];
    for (user, text) in expected {
        let line = next_line(&mut bob.feed).await;
        assert_eq!(body_of(&line), (user, &Body::Plain(text.into())));
    }

    let record = log.records("chat").pop().unwrap();
    assert_eq!(record.key.as_deref(), Some("A"));
    let envelope = codec::decode(record.value.as_deref().unwrap()).unwrap();
    assert_eq!(envelope.message, "hi");
    assert_eq!(envelope.user, "A");
    assert!(envelope.time.ends_with("+00:00"));

    let text = String::from_utf8(record.value.unwrap()).unwrap();
    assert!(text.starts_with(r#"{"message":"hi","user":"A","time":""#), "got {text}");
}

#[tokio::test]
async fn sent_record_is_visible_to_later_subscription() {
    let log = MemoryLog::new();
    let alice = ChatSession::start(&log, options("alice")).await.unwrap();
    alice.session.submit("durable").await.unwrap();

    // Started only after send returned.
    let mut late = ChatSession::start(&log, options("late")).await.unwrap();
    let mut seen = Vec::new();
    for _ in 0..3 {
        let line = next_line(&mut late.feed).await;
        let (_, body) = body_of(&line);
        seen.push(body.to_string());
    }
    assert!(seen.contains(&"durable".to_string()), "got {seen:?}");
}

#[tokio::test]
async fn join_and_leave_are_announced() {
    let log = MemoryLog::new();
    let started = ChatSession::start(&log, options("alice")).await.unwrap();
    let joined = started.joined.unwrap();
    assert_eq!(body_of(&joined), ("alice", &Body::Plain(JOIN_ANNOUNCEMENT.into())));

    started.session.leave().await.unwrap();

    let messages: Vec<String> = log
        .records("chat")
        .iter()
        .map(|r| codec::decode(r.value.as_deref().unwrap()).unwrap().message)
        .collect();
    assert_eq!(messages, [JOIN_ANNOUNCEMENT, LEAVE_ANNOUNCEMENT]);
}

#[tokio::test]
async fn failed_join_does_not_fail_startup() {
    let log = MemoryLog::new();
    log.fail_produce(Some("cluster unavailable"));

    let started = ChatSession::start(&log, options("alice")).await.unwrap();
    assert!(matches!(
        started.joined,
        Err(PublishError::Log(LogError::Delivery(ref r))) if r == "cluster unavailable"
    ));
    assert!(log.records("chat").is_empty());
}

#[tokio::test]
async fn publish_error_propagates_and_session_recovers() {
    let log = MemoryLog::new();
    let started = ChatSession::start(&log, options("alice")).await.unwrap();

    log.fail_produce(Some("not enough replicas"));
    let result = started.session.submit("lost").await;
    assert!(matches!(result, Err(PublishError::Log(LogError::Delivery(_)))));

    log.fail_produce(None);
    assert!(started.session.submit("kept").await.unwrap().is_some());
    assert_eq!(log.records("chat").len(), 2);

    // Leave reports its failure but still shuts down.
    log.fail_produce(Some("gone"));
    assert!(started.session.leave().await.is_err());
}

#[tokio::test]
async fn encrypted_sessions_share_a_key() {
    let log = MemoryLog::new();
    let key = SymmetricKey::generate();

    let mut alice_opts = options("alice");
    alice_opts.key = Some(key.clone());
    alice_opts.replay = ReplayFrom::Latest;
    let alice = ChatSession::start(&log, alice_opts).await.unwrap();

    let mut bob_opts = options("bob");
    bob_opts.key = Some(key);
    let mut bob = ChatSession::start(&log, bob_opts).await.unwrap();

    let mut eve = ChatSession::start(&log, options("eve")).await.unwrap();

    alice.session.submit("secret").await.unwrap();

    // Both see: alice's sealed join, bob's sealed join, eve's plain join, the secret.
    let mut bob_lines = Vec::new();
    let mut eve_lines = Vec::new();
    for _ in 0..4 {
        bob_lines.push(next_line(&mut bob.feed).await);
        eve_lines.push(next_line(&mut eve.feed).await);
    }

    assert_eq!(body_of(&bob_lines[0]), ("alice", &Body::Plain(JOIN_ANNOUNCEMENT.into())));
    assert_eq!(body_of(&bob_lines[3]), ("alice", &Body::Plain("secret".into())));
    // A plaintext body does not open under a key.
    assert!(matches!(body_of(&bob_lines[2]).1, Body::Undecryptable(_)));

    // Without a key bodies are shown as they travel, so eve sees tokens.
    let (user, body) = body_of(&eve_lines[0]);
    assert_eq!(user, "alice");
    assert!(matches!(body, Body::Plain(token) if token != JOIN_ANNOUNCEMENT));
    assert_eq!(body_of(&eve_lines[2]), ("eve", &Body::Plain(JOIN_ANNOUNCEMENT.into())));
    let (user, body) = body_of(&eve_lines[3]);
    assert_eq!(user, "alice");
    assert!(matches!(body, Body::Plain(token) if token != "secret"));
}
