//! Channel synchronization engine.
//!
//! Owns the ordered message log for one channel view: performs the initial
//! load, applies the live feed, and presents a single linearized view.
//! The subscription is attached before the load so that inserts racing the
//! fetch buffer in the feed channel and merge afterwards; the dedup merge
//! makes redundant deliveries harmless.
//!
//! All log mutations go through `&mut self`, so a channel view is a single
//! logical actor: overlapping async operations never race on the log.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::domain::{ChannelId, Message};
use crate::error::EngineError;

use super::log::ChannelLog;
use super::{LiveFeed, MessageBackend, SubscriptionHandle};

/// Synchronized view of one channel's message log
pub struct ChannelSync {
    channel: ChannelId,
    backend: Arc<dyn MessageBackend>,
    feed: Arc<dyn LiveFeed>,
    log: ChannelLog,
    feed_rx: Option<mpsc::Receiver<Message>>,
    subscription: Option<SubscriptionHandle>,
}

impl ChannelSync {
    pub fn new(
        channel: ChannelId,
        backend: Arc<dyn MessageBackend>,
        feed: Arc<dyn LiveFeed>,
    ) -> Self {
        Self {
            channel,
            backend,
            feed,
            log: ChannelLog::new(),
            feed_rx: None,
            subscription: None,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Shared handle to the persistence surface (for appends)
    pub fn backend(&self) -> Arc<dyn MessageBackend> {
        Arc::clone(&self.backend)
    }

    /// Attach the live feed, then load history.
    ///
    /// Subscribing first closes the fetch/subscribe race: anything
    /// inserted while the load is in flight waits in the feed buffer and
    /// is merged by the next [`drain`](Self::drain) or
    /// [`recv`](Self::recv). Idempotent: a second call replaces the feed
    /// and re-merges history through the dedup merge.
    #[instrument(skip(self), fields(channel = %self.channel))]
    pub async fn start(&mut self) -> Result<(), EngineError> {
        self.release_feed().await;

        let (rx, handle) = self.feed.subscribe(&self.channel).await?;
        self.feed_rx = Some(rx);
        self.subscription = Some(handle);

        let history = self.backend.query(&self.channel).await?;
        let merged = self.log.merge_all(history);

        info!(merged, total = self.log.len(), "Channel history loaded");
        Ok(())
    }

    /// Re-establish the feed from "now" after a transient disconnect.
    ///
    /// Previously loaded messages are kept; inserts that happened during
    /// the disconnect window are not backfilled (call
    /// [`start`](Self::start) again for a full reload).
    pub async fn resubscribe(&mut self) -> Result<(), EngineError> {
        self.release_feed().await;

        let (rx, handle) = self.feed.subscribe(&self.channel).await?;
        self.feed_rx = Some(rx);
        self.subscription = Some(handle);

        warn!(channel = %self.channel, "Feed re-established; disconnect gap not backfilled");
        Ok(())
    }

    /// Await the next new message from the live feed.
    ///
    /// Redundant deliveries (ids already merged) are skipped. Returns
    /// `None` when the feed has ended or was never attached.
    pub async fn recv(&mut self) -> Option<Message> {
        let rx = self.feed_rx.as_mut()?;

        while let Some(message) = rx.recv().await {
            if self.log.merge_insert(message.clone()) {
                return Some(message);
            }
        }

        None
    }

    /// Merge any feed events already buffered, without blocking.
    /// Returns the number of new messages merged.
    pub fn drain(&mut self) -> usize {
        let Some(rx) = self.feed_rx.as_mut() else {
            return 0;
        };

        let mut merged = 0;
        while let Ok(message) = rx.try_recv() {
            if self.log.merge_insert(message) {
                merged += 1;
            }
        }
        merged
    }

    /// Merge a locally confirmed append into the view.
    ///
    /// The same message will usually be redelivered by the feed later;
    /// the dedup merge makes that a no-op.
    pub fn apply(&mut self, message: Message) -> bool {
        self.log.merge_insert(message)
    }

    /// The linearized log, ascending by `created_at`
    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// Release the subscription. Safe to call on every exit path; also
    /// happens implicitly on drop.
    pub async fn stop(&mut self) {
        self.release_feed().await;
    }

    async fn release_feed(&mut self) {
        self.feed_rx = None;
        if let Some(handle) = self.subscription.take() {
            handle.stop().await;
        }
    }
}
