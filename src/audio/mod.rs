//! Audio capture and transcription pipeline.
//!
//! Capture acquires the microphone, buffers chunks, and assembles one
//! encoded unit on stop; transcription converts that unit to text via a
//! remote speech-to-text call. The microphone is released on stop
//! regardless of what happens downstream.

pub mod capture;
pub mod transcribe;

pub use capture::{AudioCapture, AudioUnit, CaptureError, CaptureState, Recorder};
pub use transcribe::{append_transcript, HttpTranscriber, TranscriptionBackend};
