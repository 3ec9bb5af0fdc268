//! Channel identifiers.
//!
//! A channel is a logical grouping of messages: a project's open
//! discussion, or a specific live session. Channels are created and
//! listed by the surrounding application; this core only needs their
//! stable identifiers.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Stable identifier for a discussion channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A channel record as listed by the collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
}

impl Channel {
    /// Validate an untyped channel row at the core boundary
    pub fn from_record(record: serde_json::Value) -> Result<Self, EngineError> {
        let channel: Channel = serde_json::from_value(record)
            .map_err(|e| EngineError::MalformedRecord(e.to_string()))?;

        if channel.id.as_str().is_empty() {
            return Err(EngineError::MalformedRecord("empty channel id".to_string()));
        }

        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_transparent_serde() {
        let id = ChannelId::new("session-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"session-42\"");
    }

    #[test]
    fn test_channel_from_record() {
        let channel = Channel::from_record(serde_json::json!({
            "id": "ch-1",
            "name": "General discussion",
        }))
        .unwrap();

        assert_eq!(channel.id.as_str(), "ch-1");
        assert_eq!(channel.name, "General discussion");
    }

    #[test]
    fn test_channel_from_record_rejects_empty_id() {
        let err = Channel::from_record(serde_json::json!({"id": "", "name": "x"})).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
    }
}
