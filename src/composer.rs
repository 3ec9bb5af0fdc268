//! Composer and dispatch coordinator.
//!
//! Orchestrates the compose -> send -> (optionally) trigger AI -> append
//! AI reply sequence for one channel view. All composer and log mutations
//! go through `&mut self`, so the view behaves as a single logical actor
//! even while several async operations are pending.
//!
//! Guarantees:
//! - one `send` persists exactly one human message, and at most one AI
//!   message when triggered;
//! - a failed human append restores the draft, losing no user input;
//! - a failed AI stream or AI append never retracts the human message;
//! - streamed text is persisted only after the terminal `Done`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info, instrument, warn};

use crate::audio::{append_transcript, AudioCapture, TranscriptionBackend};
use crate::config::EngineConfig;
use crate::domain::{Message, MessageDraft, ParticipantIdentity};
use crate::error::EngineError;
use crate::store::ChannelSync;
use crate::stream::{
    bounded_history, CancelHandle, ChatMessage, CompletionBackend, StreamEvent, StreamFailure,
};

/// Result of a completed `send`
#[derive(Debug)]
pub enum SendOutcome {
    /// Human message persisted; no AI trigger requested
    Posted { human: Message },

    /// Human message and one AI reply persisted
    PostedWithAi { human: Message, ai: Message },

    /// Stream finished but accumulated no text; no AI message appended
    AiSkippedEmpty { human: Message },

    /// Stream failed; the human message stands
    AiStreamFailed {
        human: Message,
        failure: StreamFailure,
    },

    /// Stream succeeded but persisting the AI reply failed; the
    /// accumulated text is handed back so the host can offer a retry
    AiAppendFailed {
        human: Message,
        accumulated: String,
        error: EngineError,
    },

    /// The stream was cancelled before a terminal event; the human
    /// message stands, no AI message was appended
    AiCancelled { human: Message },
}

impl SendOutcome {
    /// The persisted human message, present in every outcome
    pub fn human(&self) -> &Message {
        match self {
            Self::Posted { human }
            | Self::PostedWithAi { human, .. }
            | Self::AiSkippedEmpty { human }
            | Self::AiStreamFailed { human, .. }
            | Self::AiAppendFailed { human, .. }
            | Self::AiCancelled { human } => human,
        }
    }
}

/// Clears the in-flight markers when a `send` finishes or its future is
/// dropped mid-stream, so an interrupted send cannot leave the composer
/// stuck reporting `Busy`.
struct InFlightGuard {
    sending: Arc<AtomicBool>,
    active_stream: Arc<Mutex<Option<CancelHandle>>>,
}

impl InFlightGuard {
    fn arm(sending: Arc<AtomicBool>, active_stream: Arc<Mutex<Option<CancelHandle>>>) -> Self {
        sending.store(true, Ordering::SeqCst);
        Self {
            sending,
            active_stream,
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.sending.store(false, Ordering::SeqCst);
        // Cancelling is idempotent and a no-op after natural completion
        if let Ok(mut active) = self.active_stream.lock() {
            if let Some(handle) = active.take() {
                handle.cancel();
            }
        }
    }
}

/// Per-channel composer and dispatch coordinator
pub struct Composer {
    /// Channel topic, substituted into the system prompt
    topic: String,

    /// Explicit identity value; `None` until registration completes
    identity: Option<ParticipantIdentity>,

    sync: ChannelSync,
    completion: Arc<dyn CompletionBackend>,
    capture: AudioCapture,
    transcriber: Arc<dyn TranscriptionBackend>,
    config: EngineConfig,

    draft: String,
    draft_from_voice: bool,
    sending: Arc<AtomicBool>,
    transcribing: bool,
    active_stream: Arc<Mutex<Option<CancelHandle>>>,
}

impl Composer {
    pub fn new(
        topic: impl Into<String>,
        identity: Option<ParticipantIdentity>,
        sync: ChannelSync,
        completion: Arc<dyn CompletionBackend>,
        capture: AudioCapture,
        transcriber: Arc<dyn TranscriptionBackend>,
        config: EngineConfig,
    ) -> Self {
        Self {
            topic: topic.into(),
            identity,
            sync,
            completion,
            capture,
            transcriber,
            config,
            draft: String::new(),
            draft_from_voice: false,
            sending: Arc::new(AtomicBool::new(false)),
            transcribing: false,
            active_stream: Arc::new(Mutex::new(None)),
        }
    }

    /// Update the identity (e.g. after registration completes)
    pub fn set_identity(&mut self, identity: Option<ParticipantIdentity>) {
        self.identity = identity;
    }

    pub fn identity(&self) -> Option<&ParticipantIdentity> {
        self.identity.as_ref()
    }

    /// The synchronized channel view
    pub fn sync(&self) -> &ChannelSync {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut ChannelSync {
        &mut self.sync
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the draft (typed input; clears the voice provenance flag)
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.draft_from_voice = false;
    }

    /// True while a send (and possibly its AI stream) is in flight
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    /// Send the current draft, optionally triggering an AI reply.
    ///
    /// The draft is cleared optimistically; if the append fails it is
    /// restored exactly and the error surfaced. With `trigger_ai`, the
    /// AI reply is accumulated from the stream and persisted only after
    /// `Done`, so a slow or failed stream cannot corrupt the log.
    #[instrument(skip(self), fields(channel = %self.sync.channel(), trigger_ai))]
    pub async fn send(&mut self, trigger_ai: bool) -> Result<SendOutcome, EngineError> {
        if self.sending.load(Ordering::SeqCst) {
            return Err(EngineError::Busy("send"));
        }

        let content = self.draft.trim().to_string();
        if content.is_empty() {
            return Err(EngineError::WriteRejected("empty draft".to_string()));
        }

        let Some(identity) = self.identity.clone() else {
            return Err(EngineError::WriteRejected(
                "no identity resolved; register before posting".to_string(),
            ));
        };

        // Clear optimistically; keep a copy for recovery
        let saved_draft = std::mem::take(&mut self.draft);
        let saved_voice = self.draft_from_voice;
        self.draft_from_voice = false;

        // The guard resets the in-flight markers on every exit path,
        // including this future being dropped mid-stream
        let _guard = InFlightGuard::arm(
            Arc::clone(&self.sending),
            Arc::clone(&self.active_stream),
        );

        let draft = MessageDraft::human(
            self.sync.channel().clone(),
            &identity,
            content,
            saved_voice,
        );

        let human = match self.sync.backend().insert(&draft).await {
            Ok(message) => message,
            Err(e) => {
                // No user input is lost: put the draft back as it was
                self.draft = saved_draft;
                self.draft_from_voice = saved_voice;
                warn!(error = %e, "Human append failed; draft restored");
                return Err(e);
            }
        };

        info!(id = %human.id, "Human message persisted");
        self.sync.apply(human.clone());

        if !trigger_ai {
            return Ok(SendOutcome::Posted { human });
        }

        Ok(self.run_ai_reply(human).await)
    }

    /// Drive one AI completion and append the reply on success
    async fn run_ai_reply(&mut self, human: Message) -> SendOutcome {
        self.sync.drain();

        // The window covers prior messages only; the new utterance rides
        // on top of it, so a full window still reaches back
        // `history_window` entries
        let prior: Vec<Message> = self
            .sync
            .messages()
            .iter()
            .filter(|m| m.id != human.id)
            .cloned()
            .collect();
        let mut history = bounded_history(&prior, self.config.history_window);
        history.push(ChatMessage {
            role: "user",
            content: human.content.clone(),
        });
        let system_prompt = self.config.system_prompt_for(&self.topic);

        let (mut rx, handle) = self.completion.stream(history, system_prompt);
        if let Ok(mut active) = self.active_stream.lock() {
            *active = Some(handle);
        }

        let mut accumulated = String::new();

        loop {
            match rx.recv().await {
                Some(StreamEvent::Delta(fragment)) => accumulated.push_str(&fragment),
                Some(StreamEvent::Done) => break,
                Some(StreamEvent::Error(failure)) => {
                    error!(?failure, "AI stream failed");
                    return SendOutcome::AiStreamFailed { human, failure };
                }
                // Channel closed without a terminal event: the stream was
                // cancelled. A cancelled stream never appends an AI message.
                None => return SendOutcome::AiCancelled { human },
            }
        }

        if accumulated.trim().is_empty() {
            return SendOutcome::AiSkippedEmpty { human };
        }

        let draft = MessageDraft::ai(self.sync.channel().clone(), accumulated.clone());
        match self.sync.backend().insert(&draft).await {
            Ok(ai) => {
                info!(id = %ai.id, "AI reply persisted");
                self.sync.apply(ai.clone());
                SendOutcome::PostedWithAi { human, ai }
            }
            Err(error) => {
                // The human message is already persisted and stands
                warn!(%error, "AI append failed");
                SendOutcome::AiAppendFailed {
                    human,
                    accumulated,
                    error,
                }
            }
        }
    }

    /// Cancel handle for the in-flight AI stream, if any
    pub fn active_stream(&self) -> Option<CancelHandle> {
        let active = self.active_stream.lock().ok()?;
        active.clone()
    }

    /// Start a voice capture session.
    ///
    /// Single-flight per composer: rejected while recording or while a
    /// transcription is still pending.
    pub async fn start_recording(&mut self) -> Result<(), EngineError> {
        if self.transcribing {
            return Err(EngineError::Busy("transcription pending"));
        }
        self.capture.start().await.map_err(EngineError::from)
    }

    /// Stop the capture session and transcribe the recorded audio into
    /// the draft.
    ///
    /// The microphone is released by `stop()` before transcription runs,
    /// so release does not depend on transcription success. On success
    /// the text is appended to the existing draft; on failure the draft
    /// is left untouched.
    pub async fn stop_and_transcribe(&mut self) -> Result<(), EngineError> {
        let unit = self.capture.stop().map_err(EngineError::from)?;

        self.transcribing = true;
        let result = self.transcriber.transcribe(&unit).await;
        self.transcribing = false;

        let text = result?;
        self.draft = append_transcript(&self.draft, &text);
        self.draft_from_voice = true;
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_active()
    }

    /// Leave the channel view: cancel any in-flight stream and release
    /// the subscription.
    pub async fn leave(&mut self) {
        if let Ok(mut active) = self.active_stream.lock() {
            if let Some(handle) = active.take() {
                handle.cancel();
            }
        }
        self.sync.stop().await;
        info!(channel = %self.sync.channel(), "Channel view released");
    }
}
