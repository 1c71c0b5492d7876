//! Integration tests for where a new session starts reading.
//!
//! - `earliest`: every session sees the full retained history.
//! - `latest`: only records written after the session joined.
//! - `saved-offset`: a returning user resumes after what they already read.

use std::time::Duration;

use tokio::sync::mpsc;

use kafkachat::chat::{Body, ChatSession, FeedEvent, HistoryLine, SessionOptions};
use kafkachat::log::memory::MemoryLog;
use kafkachat::log::{GroupId, ReplayFrom};
use kafkachat_proto::envelope::JOIN_ANNOUNCEMENT;

const WAIT: Duration = Duration::from_secs(2);

fn options(user: &str, replay: ReplayFrom) -> SessionOptions {
    let mut opts = SessionOptions::new("chat", user);
    opts.replay = replay;
    opts.chat.poll_timeout = Duration::from_millis(5);
    opts
}

fn seed(log: &MemoryLog, messages: &[&str]) {
    for m in messages {
        let value =
            format!(r#"{{"message":"{m}","user":"old","time":"2024-01-01T12:00:00+00:00"}}"#);
        log.inject_raw("chat", Some("old"), Some(value.into_bytes()));
    }
}

async fn next_text(feed: &mut mpsc::Receiver<FeedEvent>) -> String {
    loop {
        match tokio::time::timeout(WAIT, feed.recv()).await {
            Ok(Some(FeedEvent::Line(HistoryLine::Message {
                body: Body::Plain(text),
                ..
            }))) => return text,
            Ok(Some(FeedEvent::Subscribed { .. })) => {}
            other => panic!("expected a message, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn earliest_replays_full_history_every_time() {
    let log = MemoryLog::new();
    seed(&log, &["one", "two"]);

    for user in ["a", "a"] {
        let mut started = ChatSession::start(&log, options(user, ReplayFrom::Earliest))
            .await
            .unwrap();
        assert_eq!(next_text(&mut started.feed).await, "one");
        assert_eq!(next_text(&mut started.feed).await, "two");
        assert_ne!(started.session.session().group_id, GroupId::new("kafkachat-a"));
        started.session.leave().await.unwrap();
    }
}

#[tokio::test]
async fn latest_skips_history() {
    let log = MemoryLog::new();
    seed(&log, &["old news"]);

    let mut started = ChatSession::start(&log, options("a", ReplayFrom::Latest))
        .await
        .unwrap();
    // Our own join is the first thing we see.
    assert_eq!(next_text(&mut started.feed).await, JOIN_ANNOUNCEMENT);

    seed(&log, &["fresh"]);
    assert_eq!(next_text(&mut started.feed).await, "fresh");
}

#[tokio::test]
async fn saved_offset_resumes_after_last_read() {
    let log = MemoryLog::new();
    seed(&log, &["one"]);
    let group = GroupId::new("kafkachat-a");

    let mut first = ChatSession::start(&log, options("a", ReplayFrom::SavedOffset))
        .await
        .unwrap();
    assert_eq!(first.session.session().group_id, group);
    assert_eq!(next_text(&mut first.feed).await, "one");
    assert_eq!(next_text(&mut first.feed).await, JOIN_ANNOUNCEMENT);
    first.session.leave().await.unwrap();
    let read_up_to = log.committed(&group, "chat").unwrap();
    assert_eq!(read_up_to, 2);

    seed(&log, &["while away"]);

    let mut second = ChatSession::start(&log, options("a", ReplayFrom::SavedOffset))
        .await
        .unwrap();
    // Our leave announcement was never read by the first session.
    assert_eq!(next_text(&mut second.feed).await, "Has left the chat.");
    assert_eq!(next_text(&mut second.feed).await, "while away");
}
