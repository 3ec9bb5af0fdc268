//! Domain types for the discussion engine.
//!
//! This module contains the validated core data structures:
//! - Message: Immutable entries in the channel log
//! - Channel: Discussion context identifiers
//! - Identity: Participant identity and role
//!
//! Rows arriving from the persistence/subscription surface are converted
//! into these types at ingestion, never passed through untyped.

pub mod channel;
pub mod identity;
pub mod message;

// Re-export commonly used types
pub use channel::{Channel, ChannelId};
pub use identity::{ParticipantIdentity, Role};
pub use message::{AuthorRef, Message, MessageDraft};
