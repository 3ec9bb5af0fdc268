//! Microphone capture state machine.
//!
//! `Idle -> Recording -> Stopped -> Idle`. One capture session per
//! composer: starting while a session is active is rejected. The device
//! is released unconditionally on stop, before any transcription happens.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::EngineError;

/// Errors from the capture state machine
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The user declined microphone access
    #[error("microphone permission denied")]
    PermissionDenied,

    /// A capture session is already active
    #[error("a recording is already in progress")]
    AlreadyActive,

    /// Stop called without an active recording
    #[error("no active recording")]
    NotRecording,

    /// Device-level failure while recording
    #[error("recorder failed: {0}")]
    Device(String),
}

impl From<CaptureError> for EngineError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::PermissionDenied => EngineError::PermissionDenied,
            CaptureError::AlreadyActive => EngineError::Busy("recording"),
            CaptureError::NotRecording => EngineError::Busy("no active recording"),
            CaptureError::Device(msg) => EngineError::TranscriptionFailed(msg),
        }
    }
}

/// State of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Stopped,
}

/// A single encoded audio unit assembled from all buffered chunks
#[derive(Debug, Clone)]
pub struct AudioUnit {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl AudioUnit {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Microphone device boundary.
///
/// `acquire` may prompt the user and fail with `PermissionDenied`;
/// `release` must be infallible so the device can always be let go.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Acquire the microphone and begin buffering
    async fn acquire(&mut self) -> Result<(), CaptureError>;

    /// Release the microphone and hand back all buffered chunks
    fn release(&mut self) -> Vec<Vec<u8>>;

    /// MIME type of the encoded chunks
    fn mime_type(&self) -> &str;
}

/// Capture session state machine over a [`Recorder`]
pub struct AudioCapture {
    recorder: Box<dyn Recorder>,
    state: CaptureState,
}

impl AudioCapture {
    pub fn new(recorder: Box<dyn Recorder>) -> Self {
        Self {
            recorder,
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// True while a session holds the microphone
    pub fn is_active(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Acquire the microphone and transition `Idle -> Recording`
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::AlreadyActive);
        }

        self.recorder.acquire().await?;
        self.state = CaptureState::Recording;
        info!("Recording started");
        Ok(())
    }

    /// Transition `Recording -> Stopped`, releasing the microphone
    /// unconditionally, and assemble the buffered chunks into one unit.
    ///
    /// The session returns to `Idle` before this method returns, so the
    /// caller may start a new capture even if it discards the unit.
    pub fn stop(&mut self) -> Result<AudioUnit, CaptureError> {
        if self.state != CaptureState::Recording {
            return Err(CaptureError::NotRecording);
        }

        self.state = CaptureState::Stopped;
        let chunks = self.recorder.release();

        let unit = AudioUnit {
            data: chunks.concat(),
            mime_type: self.recorder.mime_type().to_string(),
        };

        debug!(bytes = unit.data.len(), "Recording stopped, microphone released");
        self.state = CaptureState::Idle;
        Ok(unit)
    }
}
