//! The [`Transcriber`] capability and its error type.
//!
//! [`Transcriber`] is the only thing the turn orchestrator knows about
//! speech recognition.  It is object-safe and `Send + Sync` so it can be held
//! behind an `Arc<dyn Transcriber>`.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::WavContainer;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// Transcription failures.  The orchestrator discards the turn on any of
/// these and records again.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// No API key configured.
    #[error("speech-to-text API key is not set")]
    MissingApiKey,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("transcription request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("transcription service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("failed to parse transcription response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SttError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SttError::Timeout
        } else {
            SttError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Turns a recorded WAV into text.
///
/// # Contract
///
/// - A container with no samples yields `Ok("")` without contacting the
///   provider.
/// - Whitespace-only results are returned as-is; the caller decides what an
///   empty transcript means.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav: &WavContainer) -> Result<String, SttError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
