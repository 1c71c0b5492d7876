//! Integration tests for the subscriber loop.
//!
//! Covers:
//! 1. A malformed record yields exactly one decode error line and the loop
//!    keeps delivering.
//! 2. A broker error yields exactly one terminal report and polling stops.
//! 3. Undecryptable bodies render as a placeholder.
//! 4. The loop stops when the UI drops the feed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use kafkachat::chat::subscribe::Subscriber;
use kafkachat::chat::{Body, FeedEvent, HistoryLine, LoopExit};
use kafkachat::crypto::keys::SymmetricKey;
use kafkachat::crypto::{BodyCipher, Plaintext, cipher_for};
use kafkachat::log::memory::MemoryLog;
use kafkachat::log::{GroupId, LogBroker, ReplayFrom};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const WAIT: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(5);

fn valid(user: &str, message: &str) -> Vec<u8> {
    format!(r#"{{"message":"{message}","user":"{user}","time":"2024-01-01T12:00:00.000000+00:00"}}"#)
        .into_bytes()
}

fn spawn(
    log: &MemoryLog,
    group: &GroupId,
    cipher: Arc<dyn BodyCipher>,
) -> (mpsc::Receiver<FeedEvent>, tokio::task::JoinHandle<LoopExit>) {
    let consumer = log.consumer(group, ReplayFrom::Earliest).unwrap();
    Subscriber::new(consumer, "chat", group.clone(), cipher, POLL).spawn(16)
}

async fn next_event(feed: &mut mpsc::Receiver<FeedEvent>) -> FeedEvent {
    tokio::time::timeout(WAIT, feed.recv())
        .await
        .expect("feed event in time")
        .expect("feed still open")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_record_reports_once_and_loop_continues() {
    let log = MemoryLog::new();
    log.inject_raw("chat", Some("x"), Some(b"{not json".to_vec()));
    log.inject_raw("chat", Some("A"), Some(valid("A", "after")));

    let group = GroupId::fresh();
    let (mut feed, handle) = spawn(&log, &group, Arc::new(Plaintext));

    assert!(matches!(next_event(&mut feed).await, FeedEvent::Subscribed { .. }));
    match next_event(&mut feed).await {
        FeedEvent::Line(HistoryLine::DecodeError { raw, .. }) => assert_eq!(raw, "{not json"),
        other => panic!("expected decode error, got {other:?}"),
    }
    match next_event(&mut feed).await {
        FeedEvent::Line(line) => {
            assert_eq!(line.to_string(), format!("{} A: after", line_time(&line)));
        }
        other => panic!("expected message, got {other:?}"),
    }

    // Records appended later still arrive.
    log.inject_raw("chat", Some("B"), Some(valid("B", "later")));
    assert!(matches!(
        next_event(&mut feed).await,
        FeedEvent::Line(HistoryLine::Message { ref user, .. }) if user == "B"
    ));
    handle.abort();
}

fn line_time(line: &HistoryLine) -> &str {
    match line {
        HistoryLine::Message { time, .. } => time,
        other => panic!("expected message, got {other:?}"),
    }
}

#[tokio::test]
async fn broker_error_terminates_exactly_once() {
    let log = MemoryLog::new();
    log.inject_raw("chat", Some("A"), Some(valid("A", "before")));
    log.inject_error("chat", "all brokers down");
    log.inject_raw("chat", Some("A"), Some(valid("A", "never shown")));

    let group = GroupId::fresh();
    let (mut feed, handle) = spawn(&log, &group, Arc::new(Plaintext));

    let exit = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(exit, LoopExit::BrokerError("broker error: all brokers down".into()));

    let mut events = Vec::new();
    while let Some(event) = feed.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 3, "got {events:?}");
    assert!(matches!(events[1], FeedEvent::Line(HistoryLine::Message { .. })));
    assert!(matches!(
        events[2],
        FeedEvent::Terminated { ref reason } if reason.contains("all brokers down")
    ));

    // No further polling after the error.
    let polls = log.poll_count(&group);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(log.poll_count(&group), polls);
    assert_eq!(polls, 2);
}

#[tokio::test]
async fn undecryptable_body_renders_placeholder() {
    let log = MemoryLog::new();
    let foreign = cipher_for(Some(SymmetricKey::generate()));
    let token = foreign.seal("for someone else").unwrap();
    log.inject_raw("chat", Some("C"), Some(valid("C", &token)));

    let ours = cipher_for(Some(SymmetricKey::generate()));
    let (mut feed, handle) = spawn(&log, &GroupId::fresh(), ours);

    next_event(&mut feed).await;
    match next_event(&mut feed).await {
        FeedEvent::Line(HistoryLine::Message { user, body, .. }) => {
            assert_eq!(user, "C");
            assert_eq!(body, Body::Undecryptable(token));
        }
        other => panic!("expected placeholder message, got {other:?}"),
    }
    handle.abort();
}

#[tokio::test]
async fn tombstone_renders_decode_error() {
    let log = MemoryLog::new();
    log.inject_raw("chat", Some("A"), None);

    let (mut feed, handle) = spawn(&log, &GroupId::fresh(), Arc::new(Plaintext));
    next_event(&mut feed).await;
    assert!(matches!(
        next_event(&mut feed).await,
        FeedEvent::Line(HistoryLine::DecodeError { .. })
    ));
    handle.abort();
}

#[tokio::test]
async fn loop_exits_when_feed_is_dropped() {
    let log = MemoryLog::new();
    let (feed, handle) = spawn(&log, &GroupId::fresh(), Arc::new(Plaintext));
    drop(feed);

    let exit = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(exit, LoopExit::UiClosed);
}
