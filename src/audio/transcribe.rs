//! Remote speech-to-text transcription.
//!
//! The encoded audio unit is base64-encoded and submitted as JSON; the
//! backend answers `{ "text": ... }`. A failed transcription never
//! touches the composer's existing draft.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use tracing::info;

use crate::error::EngineError;

use super::capture::AudioUnit;

/// Speech-to-text backend boundary
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Convert one audio unit to text
    async fn transcribe(&self, unit: &AudioUnit) -> Result<String, EngineError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// HTTP implementation of the transcription backend
pub struct HttpTranscriber {
    client: reqwest::Client,
    url: String,
}

impl HttpTranscriber {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for HttpTranscriber {
    async fn transcribe(&self, unit: &AudioUnit) -> Result<String, EngineError> {
        if unit.is_empty() {
            return Err(EngineError::TranscriptionFailed(
                "empty audio unit".to_string(),
            ));
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(&unit.data);

        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "audio": encoded,
                "mime_type": unit.mime_type,
            }))
            .send()
            .await
            .map_err(|e| EngineError::TranscriptionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::TranscriptionFailed(format!(
                "status {}",
                response.status()
            )));
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| EngineError::TranscriptionFailed(e.to_string()))?;

        let text = body.text.trim().to_string();
        info!(chars = text.len(), "Transcription complete");
        Ok(text)
    }
}

/// Append transcribed text to an existing draft, inserting a separating
/// space when the draft is non-empty.
pub fn append_transcript(draft: &str, transcript: &str) -> String {
    let transcript = transcript.trim();
    if draft.is_empty() {
        transcript.to_string()
    } else if draft.ends_with(char::is_whitespace) || transcript.is_empty() {
        format!("{}{}", draft, transcript)
    } else {
        format!("{} {}", draft, transcript)
    }
}
