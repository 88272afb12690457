//! Text-to-speech.
//!
//! [`Synthesizer`] returns raw little-endian 16-bit PCM at a fixed rate; the
//! orchestrator wraps it with [`pcm16_to_wav`](crate::audio::pcm16_to_wav)
//! before playback.

pub mod elevenlabs;

pub use elevenlabs::ElevenLabsSynthesizer;

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("text-to-speech {0} is not set")]
    MissingSetting(&'static str),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("speech synthesis request timed out")]
    Timeout,

    #[error("speech synthesis service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// PCM payload with an odd byte count.
    #[error("synthesized audio is not 16-bit PCM ({0} bytes)")]
    MalformedAudio(usize),
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesizer trait
// ---------------------------------------------------------------------------

/// Turns reply text into mono 16-bit PCM bytes at [`sample_rate`](Self::sample_rate).
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError>;

    /// Rate of the PCM returned by [`synthesize`](Self::synthesize), in Hz.
    fn sample_rate(&self) -> u32;
}
