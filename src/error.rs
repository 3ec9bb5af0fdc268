//! Error taxonomy for the discussion engine.
//!
//! Every failure in this crate is recoverable at the caller boundary:
//! the message log is never rolled back, and draft text is never lost.

use thiserror::Error;

/// Errors surfaced by the discussion engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The persistence/query surface could not be reached
    #[error("message store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected a write (e.g. missing author, empty content)
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// Network/backend unreachable during streaming
    #[error("transport error: {0}")]
    Transport(String),

    /// The completion backend returned an error payload
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Microphone access was declined
    #[error("microphone permission denied")]
    PermissionDenied,

    /// The speech-to-text backend failed; the composer draft is untouched
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// A record arriving from the persistence/subscription surface did not
    /// match the expected schema
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A single-flight operation was already in progress
    #[error("operation already in flight: {0}")]
    Busy(&'static str),
}

impl EngineError {
    /// True if the caller may reasonably retry the same operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::Transport(_) | Self::TranscriptionFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::StoreUnavailable("down".into()).is_retryable());
        assert!(EngineError::Transport("reset".into()).is_retryable());
        assert!(!EngineError::WriteRejected("no author".into()).is_retryable());
        assert!(!EngineError::Busy("recording").is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let e = EngineError::WriteRejected("missing author".to_string());
        assert_eq!(e.to_string(), "write rejected: missing author");

        let e = EngineError::PermissionDenied;
        assert_eq!(e.to_string(), "microphone permission denied");
    }
}
