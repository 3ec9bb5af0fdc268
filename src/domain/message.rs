//! Message types for the append-only channel log.
//!
//! Messages are immutable once created. The log's total order is defined
//! by `created_at`, ties broken by arrival order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

use super::channel::ChannelId;
use super::identity::ParticipantIdentity;

/// Who authored a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "member_id")]
pub enum AuthorRef {
    /// A registered workspace member
    Member(String),

    /// The AI assistant (no member record)
    Ai,

    /// No human registered (system sentinel)
    Unset,
}

impl AuthorRef {
    /// Member id, if this is a member-authored message
    pub fn member_id(&self) -> Option<&str> {
        match self {
            Self::Member(id) => Some(id.as_str()),
            _ => None,
        }
    }
}

/// A single entry in the append-only channel log.
///
/// Messages are the source of truth for a discussion. They are never
/// edited or deleted by this core; `id` and `created_at` are assigned by
/// the server on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned unique identifier
    pub id: String,

    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Author (member, AI, or unset)
    pub author: AuthorRef,

    /// UTF-8 text; may be multi-paragraph markdown for AI messages
    pub content: String,

    /// Authored by the AI assistant
    pub is_ai: bool,

    /// Authored by a participant with the teacher role
    pub is_teacher: bool,

    /// Produced by voice dictation
    pub is_voice_transcription: bool,

    /// Server-assigned timestamp; defines the log order
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Validate and convert an untyped row arriving from the
    /// persistence/subscription surface.
    ///
    /// Rejects rows with missing or empty required fields instead of
    /// propagating duck-typed data into the log.
    pub fn from_record(record: serde_json::Value) -> Result<Self, EngineError> {
        let message: Message = serde_json::from_value(record)
            .map_err(|e| EngineError::MalformedRecord(e.to_string()))?;

        if message.id.is_empty() {
            return Err(EngineError::MalformedRecord("empty message id".to_string()));
        }
        if message.channel_id.as_str().is_empty() {
            return Err(EngineError::MalformedRecord("empty channel id".to_string()));
        }
        // Human messages must carry text; AI messages are validated at
        // append time (empty accumulations are never persisted).
        if !message.is_ai && message.content.trim().is_empty() {
            return Err(EngineError::MalformedRecord(
                "empty content on human message".to_string(),
            ));
        }

        Ok(message)
    }
}

/// A message before persistence: the server assigns `id` and `created_at`
/// on insert and returns the stored [`Message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDraft {
    pub channel_id: ChannelId,
    pub author: AuthorRef,
    pub content: String,
    pub is_ai: bool,
    pub is_teacher: bool,
    pub is_voice_transcription: bool,
}

impl MessageDraft {
    /// Draft for a human message, stamped from a resolved identity
    pub fn human(
        channel_id: ChannelId,
        identity: &ParticipantIdentity,
        content: impl Into<String>,
        is_voice_transcription: bool,
    ) -> Self {
        Self {
            channel_id,
            author: AuthorRef::Member(identity.member_id.clone()),
            content: content.into(),
            is_ai: false,
            is_teacher: identity.role.is_teacher(),
            is_voice_transcription,
        }
    }

    /// Draft for an AI-authored reply
    pub fn ai(channel_id: ChannelId, content: impl Into<String>) -> Self {
        Self {
            channel_id,
            author: AuthorRef::Ai,
            content: content.into(),
            is_ai: true,
            is_teacher: false,
            is_voice_transcription: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn record(id: &str, content: &str, is_ai: bool) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "channel_id": "ch-1",
            "author": if is_ai { serde_json::json!({"kind": "ai"}) } else { serde_json::json!({"kind": "member", "member_id": "m-1"}) },
            "content": content,
            "is_ai": is_ai,
            "is_teacher": false,
            "is_voice_transcription": false,
            "created_at": "2025-03-10T12:00:00Z",
        })
    }

    #[test]
    fn test_message_serialization_round_trip() {
        let message = Message::from_record(record("msg-1", "hello", false)).unwrap();
        let json = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, "msg-1");
        assert_eq!(parsed.author, AuthorRef::Member("m-1".to_string()));
        assert!(!parsed.is_ai);
    }

    #[test]
    fn test_from_record_rejects_empty_id() {
        let err = Message::from_record(record("", "hello", false)).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
    }

    #[test]
    fn test_from_record_rejects_empty_human_content() {
        let err = Message::from_record(record("msg-1", "   ", false)).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
    }

    #[test]
    fn test_from_record_rejects_missing_fields() {
        let err = Message::from_record(serde_json::json!({"id": "msg-1"})).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
    }

    #[test]
    fn test_human_draft_stamps_identity() {
        let identity = ParticipantIdentity {
            member_id: "m-7".to_string(),
            role: Role::Teacher,
            display_label: "Dr. Ngo".to_string(),
        };

        let draft = MessageDraft::human(ChannelId::new("ch-1"), &identity, "welcome", false);

        assert_eq!(draft.author, AuthorRef::Member("m-7".to_string()));
        assert!(draft.is_teacher);
        assert!(!draft.is_ai);
    }

    #[test]
    fn test_ai_draft_has_no_member() {
        let draft = MessageDraft::ai(ChannelId::new("ch-1"), "a reply");

        assert_eq!(draft.author, AuthorRef::Ai);
        assert!(draft.is_ai);
        assert!(!draft.is_teacher);
        assert!(draft.author.member_id().is_none());
    }
}
