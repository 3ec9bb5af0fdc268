//! Log Ordering Integration Tests
//!
//! Verifies that the synchronized channel view stays sorted by
//! `created_at` with no duplicate ids, for all interleavings of load
//! completion and live-feed delivery.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use colloq::store::SubscriptionHandle;
use colloq::{
    AuthorRef, ChannelId, ChannelSync, EngineError, LiveFeed, Message, MessageBackend,
    MessageDraft,
};

fn msg(id: &str, at_secs: i64) -> Message {
    Message {
        id: id.to_string(),
        channel_id: ChannelId::new("ch-1"),
        author: AuthorRef::Member("m-1".to_string()),
        content: format!("message {}", id),
        is_ai: false,
        is_teacher: false,
        is_voice_transcription: false,
        created_at: Utc.timestamp_opt(at_secs, 0).unwrap(),
    }
}

fn ids(sync: &ChannelSync) -> Vec<String> {
    sync.messages().iter().map(|m| m.id.clone()).collect()
}

/// Backend serving a fixed history
struct FixedBackend {
    history: Vec<Message>,
}

#[async_trait]
impl MessageBackend for FixedBackend {
    async fn insert(&self, _draft: &MessageDraft) -> Result<Message, EngineError> {
        Err(EngineError::WriteRejected("read-only test backend".into()))
    }

    async fn query(&self, _channel: &ChannelId) -> Result<Vec<Message>, EngineError> {
        Ok(self.history.clone())
    }
}

/// Feed whose sender stays in the test's hands, so delivery timing is
/// fully controlled
struct ManualFeed {
    handout: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl ManualFeed {
    fn new() -> (Arc<Self>, mpsc::Sender<Message>) {
        let (tx, rx) = mpsc::channel(32);
        (
            Arc::new(Self {
                handout: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

#[async_trait]
impl LiveFeed for ManualFeed {
    async fn subscribe(
        &self,
        _channel: &ChannelId,
    ) -> Result<(mpsc::Receiver<Message>, SubscriptionHandle), EngineError> {
        let rx = self
            .handout
            .lock()
            .unwrap()
            .take()
            .expect("single subscription per ManualFeed");
        let task = tokio::spawn(std::future::pending::<()>());
        Ok((rx, SubscriptionHandle::new(task)))
    }
}

fn build_sync(history: Vec<Message>) -> (ChannelSync, mpsc::Sender<Message>) {
    let (feed, tx) = ManualFeed::new();
    let sync = ChannelSync::new(
        ChannelId::new("ch-1"),
        Arc::new(FixedBackend { history }),
        feed,
    );
    (sync, tx)
}

#[tokio::test]
async fn test_live_insert_after_load() {
    let (mut sync, tx) = build_sync(vec![msg("A", 1), msg("B", 2)]);
    sync.start().await.unwrap();

    tx.send(msg("C", 3)).await.unwrap();
    let delivered = sync.recv().await.unwrap();

    assert_eq!(delivered.id, "C");
    assert_eq!(ids(&sync), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_redelivery_produces_no_duplicate() {
    // Scenario: [A@t1, B@t2] loaded; feed delivers C@t3 then a late
    // redelivery of B; rendered log stays [A, B, C]
    let (mut sync, tx) = build_sync(vec![msg("A", 1), msg("B", 2)]);
    sync.start().await.unwrap();

    tx.send(msg("C", 3)).await.unwrap();
    tx.send(msg("B", 2)).await.unwrap();

    assert_eq!(sync.recv().await.unwrap().id, "C");
    drop(tx);
    // The duplicate B is swallowed; the feed then ends
    assert!(sync.recv().await.is_none());

    assert_eq!(ids(&sync), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_feed_event_racing_the_load_is_buffered() {
    // The insert arrives before start() finishes loading: it waits in
    // the feed buffer and merges in order afterwards
    let (mut sync, tx) = build_sync(vec![msg("A", 1), msg("B", 2)]);

    tx.send(msg("C", 3)).await.unwrap();
    sync.start().await.unwrap();

    assert_eq!(sync.drain(), 1);
    assert_eq!(ids(&sync), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_feed_event_duplicating_the_load_is_dropped() {
    // The same message arrives through both the load and the buffered
    // feed; the load already merged it, the feed copy is redundant
    let (mut sync, tx) = build_sync(vec![msg("A", 1), msg("B", 2)]);

    tx.send(msg("B", 2)).await.unwrap();
    sync.start().await.unwrap();

    assert_eq!(sync.drain(), 0);
    assert_eq!(ids(&sync), vec!["A", "B"]);
}

#[tokio::test]
async fn test_out_of_order_feed_delivery_is_sorted() {
    let (mut sync, tx) = build_sync(vec![]);
    sync.start().await.unwrap();

    tx.send(msg("late", 10)).await.unwrap();
    tx.send(msg("early", 5)).await.unwrap();

    sync.recv().await.unwrap();
    sync.recv().await.unwrap();

    assert_eq!(ids(&sync), vec!["early", "late"]);
}

#[tokio::test]
async fn test_created_at_ties_keep_arrival_order() {
    let (mut sync, tx) = build_sync(vec![]);
    sync.start().await.unwrap();

    for name in ["first", "second", "third"] {
        tx.send(msg(name, 7)).await.unwrap();
        sync.recv().await.unwrap();
    }

    assert_eq!(ids(&sync), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_timestamps_non_decreasing_once_synced() {
    let (mut sync, tx) = build_sync(vec![msg("A", 3), msg("B", 1), msg("C", 2)]);
    sync.start().await.unwrap();

    tx.send(msg("D", 2)).await.unwrap();
    sync.recv().await.unwrap();

    let times: Vec<_> = sync.messages().iter().map(|m| m.created_at).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}
