//! colloq - Real-time collaborative discussion engine
//!
//! The core of a course-project collaboration workspace: small teams
//! discuss a shared topic in channels, an AI assistant participates in the
//! discussion, and members dictate notes by voice during live sessions.
//!
//! # Architecture
//!
//! The engine is built around an append-only message log per channel:
//! - The initial load and the live feed merge through one de-duplicating
//!   step, so every viewer sees a single linearized log
//! - AI replies stream incrementally but are persisted only after the
//!   terminal done event
//! - The log is never edited, deleted from, or rolled back
//!
//! # Modules
//!
//! - `domain`: Validated data structures (Message, Channel, Identity)
//! - `identity`: Participant identity resolution with explicit lifecycle
//! - `store`: Message persistence, live feed, and the sync engine
//! - `stream`: Cancellable streaming completion client
//! - `audio`: Microphone capture and remote transcription
//! - `composer`: The dispatch coordinator tying it all together
//!
//! This crate is a library with no CLI surface; the surrounding
//! application supplies authentication, channel management, and rendering.

pub mod audio;
pub mod composer;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod sse;
pub mod store;
pub mod stream;

// Re-export main types at crate root for convenience
pub use composer::{Composer, SendOutcome};
pub use config::EngineConfig;
pub use domain::{AuthorRef, Channel, ChannelId, Message, MessageDraft, ParticipantIdentity, Role};
pub use error::EngineError;
pub use identity::{FileIdentityStore, IdentityResolver, IdentityStore};
pub use store::{
    ChannelLog, ChannelSync, HttpLiveFeed, HttpMessageBackend, LiveFeed, MessageBackend,
    SubscriptionHandle,
};
pub use stream::{
    CancelHandle, ChatMessage, CompletionBackend, HttpCompletionClient, StreamEvent, StreamFailure,
};

// Voice dictation
pub use audio::{AudioCapture, AudioUnit, HttpTranscriber, Recorder, TranscriptionBackend};
