//! Streaming completion client.
//!
//! One assistant-completion request per trigger, delivered as a bounded
//! channel of tagged events: zero or more `Delta`s, then exactly one
//! terminal `Done` or `Error`. The pump task returns immediately after
//! sending a terminal event, so nothing can follow it. Failures are
//! always delivered through the channel, never thrown past it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::Message;
use crate::error::EngineError;
use crate::sse::SseBuffer;

/// Capacity of the event channel; deltas are small text fragments
const EVENT_BUFFER: usize = 64;

/// Why a stream ended without producing a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFailure {
    /// Network/backend unreachable
    Transport(String),

    /// The backend returned an error payload
    Upstream(String),
}

impl From<StreamFailure> for EngineError {
    fn from(failure: StreamFailure) -> Self {
        match failure {
            StreamFailure::Transport(msg) => EngineError::Transport(msg),
            StreamFailure::Upstream(msg) => EngineError::Upstream(msg),
        }
    }
}

/// One event in a completion stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text fragment, to be concatenated in arrival order
    Delta(String),

    /// Successful termination; the accumulated text is now complete
    Done,

    /// Failed termination
    Error(StreamFailure),
}

/// Role-tagged history entry sent to the completion backend
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Translate the most recent `window` log entries into role-tagged
/// history: AI-authored messages become `assistant`, everything else
/// `user`.
pub fn bounded_history(messages: &[Message], window: usize) -> Vec<ChatMessage> {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|m| ChatMessage {
            role: if m.is_ai { "assistant" } else { "user" },
            content: m.content.clone(),
        })
        .collect()
}

/// Cancels an in-flight stream.
///
/// Cancellation aborts the pump task, which suppresses all further events
/// and releases the transport. Idempotent: repeated calls (and calls after
/// natural completion) have no observable effect.
#[derive(Clone)]
pub struct CancelHandle {
    task: Arc<tokio::task::JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Wrap a pump task. Exposed so alternative [`CompletionBackend`]
    /// implementations (and test fakes) can hand out handles.
    pub fn for_task(task: tokio::task::JoinHandle<()>) -> Self {
        Self {
            task: Arc::new(task),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Completion backend boundary: one stream per trigger
pub trait CompletionBackend: Send + Sync {
    /// Start a completion for the given history and system prompt.
    ///
    /// Never fails directly; request errors arrive as a terminal
    /// [`StreamEvent::Error`] on the returned channel.
    fn stream(
        &self,
        history: Vec<ChatMessage>,
        system_prompt: String,
    ) -> (mpsc::Receiver<StreamEvent>, CancelHandle);
}

/// HTTP client for an OpenAI-style streaming chat-completions endpoint
pub struct HttpCompletionClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

impl HttpCompletionClient {
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

impl CompletionBackend for HttpCompletionClient {
    fn stream(
        &self,
        history: Vec<ChatMessage>,
        system_prompt: String,
    ) -> (mpsc::Receiver<StreamEvent>, CancelHandle) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let client = self.client.clone();
        let url = self.url.clone();
        let model = self.model.clone();
        let api_key = self.api_key.clone();

        let request_id = Uuid::new_v4();
        let turns = history.len();
        let task = tokio::spawn(async move {
            info!(%request_id, turns, "Starting completion stream");
            let terminal = run_stream(client, url, model, api_key, history, system_prompt, &tx).await;
            debug!(%request_id, terminal = ?terminal, "Completion stream finished");
            // Exactly one terminal event, then the pump exits
            let _ = tx.send(terminal).await;
        });

        (rx, CancelHandle::for_task(task))
    }
}

/// Drive one request to completion, forwarding deltas; returns the
/// terminal event.
async fn run_stream(
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    history: Vec<ChatMessage>,
    system_prompt: String,
    tx: &mpsc::Sender<StreamEvent>,
) -> StreamEvent {
    let mut messages = vec![ChatMessage {
        role: "system",
        content: system_prompt,
    }];
    messages.extend(history);

    let body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": true,
    });

    let mut request = client.post(&url).json(&body);
    if !api_key.is_empty() {
        request = request.bearer_auth(&api_key);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return StreamEvent::Error(StreamFailure::Transport(e.to_string())),
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "Completion backend rejected request");
        return StreamEvent::Error(StreamFailure::Upstream(format!("{}: {}", status, body)));
    }

    let mut stream = response.bytes_stream();
    let mut buffer = SseBuffer::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => return StreamEvent::Error(StreamFailure::Transport(e.to_string())),
        };

        for payload in buffer.push(&String::from_utf8_lossy(&chunk)) {
            if let Some(terminal) = forward_payload(&payload, tx).await {
                return terminal;
            }
        }
    }

    // Flush a trailing payload the body closed without terminating
    if let Some(payload) = buffer.finish() {
        if let Some(terminal) = forward_payload(&payload, tx).await {
            return terminal;
        }
    }

    // Stream closed without an explicit [DONE]; treat a clean close as
    // successful termination
    StreamEvent::Done
}

/// Handle one SSE payload, forwarding any delta; returns the terminal
/// event it produced, if any
async fn forward_payload(payload: &str, tx: &mpsc::Sender<StreamEvent>) -> Option<StreamEvent> {
    if payload == "[DONE]" {
        return Some(StreamEvent::Done);
    }

    let json: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Skipping unparseable stream payload");
            return None;
        }
    };

    if let Some(error) = json.get("error") {
        return Some(StreamEvent::Error(StreamFailure::Upstream(error.to_string())));
    }

    if let Some(delta) = json["choices"][0]["delta"]["content"].as_str() {
        if tx.send(StreamEvent::Delta(delta.to_string())).await.is_err() {
            // Receiver gone; the composer stopped listening
            return Some(StreamEvent::Done);
        }
    }

    None
}
