//! Message persistence and realtime feed interfaces.
//!
//! The surrounding application supplies the actual persistence/query
//! surface; this module defines the typed boundary ([`MessageBackend`],
//! [`LiveFeed`]) and HTTP implementations of both. Rows are validated at
//! ingestion via [`Message::from_record`].

pub mod log;
pub mod sync;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::{ChannelId, Message, MessageDraft};
use crate::error::EngineError;
use crate::sse::SseBuffer;

pub use log::ChannelLog;
pub use sync::ChannelSync;

/// Capacity of the feed channel; events buffered here during the initial
/// load are merged once the load completes
const FEED_BUFFER: usize = 256;

/// Persistence/query surface for the append-only message log
#[async_trait]
pub trait MessageBackend: Send + Sync {
    /// Persist a new message; the server assigns id and timestamp
    async fn insert(&self, draft: &MessageDraft) -> Result<Message, EngineError>;

    /// Full history of a channel, ascending by `created_at`
    async fn query(&self, channel: &ChannelId) -> Result<Vec<Message>, EngineError>;
}

/// Standing insert-event feed for a channel
#[async_trait]
pub trait LiveFeed: Send + Sync {
    /// Establish a feed delivering every message appended after
    /// subscription start. The handle releases the feed; dropping it has
    /// the same effect.
    async fn subscribe(
        &self,
        channel: &ChannelId,
    ) -> Result<(mpsc::Receiver<Message>, SubscriptionHandle), EngineError>;
}

/// Scoped handle for an active subscription.
///
/// The feed pump stops when `stop()` is called or the handle is dropped,
/// so release is guaranteed on every exit path.
pub struct SubscriptionHandle {
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn new(task: tokio::task::JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Stop the feed pump and release transport resources
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // JoinError from an aborted task is expected
            let _ = task.await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Map a non-success store response to the error taxonomy.
///
/// Client errors are permanent write rejections, except 408 and 429,
/// which are transient and therefore classified as retryable.
fn classify_store_status(status: StatusCode, body: String) -> EngineError {
    let transient =
        status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS;
    if status.is_client_error() && !transient {
        EngineError::WriteRejected(format!("{}: {}", status, body))
    } else {
        EngineError::StoreUnavailable(format!("{}: {}", status, body))
    }
}

/// HTTP implementation of the persistence/query surface
pub struct HttpMessageBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMessageBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn messages_url(&self, channel: &ChannelId) -> String {
        format!("{}/channels/{}/messages", self.base_url, channel)
    }
}

#[async_trait]
impl MessageBackend for HttpMessageBackend {
    async fn insert(&self, draft: &MessageDraft) -> Result<Message, EngineError> {
        let response = self
            .client
            .post(self.messages_url(&draft.channel_id))
            .json(draft)
            .send()
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_store_status(status, body));
        }

        let record: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        Message::from_record(record)
    }

    async fn query(&self, channel: &ChannelId) -> Result<Vec<Message>, EngineError> {
        let response = self
            .client
            .get(self.messages_url(channel))
            .query(&[("order", "created_at.asc")])
            .send()
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::StoreUnavailable(format!(
                "status {}",
                response.status()
            )));
        }

        let records: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        records.into_iter().map(Message::from_record).collect()
    }
}

/// HTTP (SSE) implementation of the realtime feed
pub struct HttpLiveFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLiveFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LiveFeed for HttpLiveFeed {
    async fn subscribe(
        &self,
        channel: &ChannelId,
    ) -> Result<(mpsc::Receiver<Message>, SubscriptionHandle), EngineError> {
        let url = format!("{}/channels/{}/feed", self.base_url, channel);

        // Connect before spawning so subscription failures surface to the
        // caller instead of vanishing inside the pump
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::StoreUnavailable(format!(
                "feed status {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let channel = channel.clone();

        let task = tokio::spawn(async move {
            info!(%channel, "Live feed attached");

            let mut stream = response.bytes_stream();
            let mut buffer = SseBuffer::new();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        // Transient disconnect: the engine resubscribes
                        // from "now"; loaded messages are never dropped
                        warn!(%channel, error = %e, "Live feed disconnected");
                        break;
                    }
                };

                for payload in buffer.push(&String::from_utf8_lossy(&chunk)) {
                    let record = match serde_json::from_str::<serde_json::Value>(&payload) {
                        Ok(value) => value,
                        Err(e) => {
                            warn!(%channel, error = %e, "Unparseable feed payload");
                            continue;
                        }
                    };

                    match Message::from_record(record) {
                        Ok(message) => {
                            debug!(%channel, id = %message.id, "Feed insert");
                            if tx.send(message).await.is_err() {
                                // Receiver gone: viewer left the channel
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(%channel, error = %e, "Rejected malformed feed record");
                        }
                    }
                }
            }
        });

        Ok((rx, SubscriptionHandle::new(task)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_permanent_rejections() {
        let err = classify_store_status(StatusCode::UNPROCESSABLE_ENTITY, "bad row".into());
        assert!(matches!(err, EngineError::WriteRejected(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_and_rate_limit_are_retryable() {
        for status in [StatusCode::REQUEST_TIMEOUT, StatusCode::TOO_MANY_REQUESTS] {
            let err = classify_store_status(status, String::new());
            assert!(matches!(err, EngineError::StoreUnavailable(_)));
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = classify_store_status(StatusCode::BAD_GATEWAY, String::new());
        assert!(matches!(err, EngineError::StoreUnavailable(_)));
        assert!(err.is_retryable());
    }
}
