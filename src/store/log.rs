//! In-memory ordered channel log with de-duplication.
//!
//! The merge step is deliberately independent of transport so the ordering
//! invariant can be verified without a network: entries from the initial
//! load and entries arriving through the live feed go through the same
//! [`ChannelLog::merge_insert`], which ignores ids already present.

use std::collections::HashSet;

use crate::domain::Message;

/// Ordered, append-only view of a channel's messages.
///
/// Order is ascending `created_at`; equal timestamps keep arrival order.
#[derive(Debug, Default)]
pub struct ChannelLog {
    entries: Vec<Message>,
    seen_ids: HashSet<String>,
}

impl ChannelLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one message into the log.
    ///
    /// Returns `false` if a message with the same id is already present
    /// (redelivery from the live feed, or the load/subscribe race). The
    /// insertion point is after the last entry with `created_at <=` the
    /// new message's, so ties break by arrival order.
    pub fn merge_insert(&mut self, message: Message) -> bool {
        if !self.seen_ids.insert(message.id.clone()) {
            return false;
        }

        let position = self
            .entries
            .iter()
            .rposition(|m| m.created_at <= message.created_at)
            .map(|i| i + 1)
            .unwrap_or(0);

        self.entries.insert(position, message);
        true
    }

    /// Merge a batch (e.g. the initial load), returning how many were new
    pub fn merge_all(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        messages
            .into_iter()
            .filter(|m| self.merge_insert(m.clone()))
            .count()
    }

    /// The linearized log, ascending by `created_at`
    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
