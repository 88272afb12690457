//! Speech-to-text.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │               Transcriber (trait)             │
//! │                                               │
//! │   WavContainer ──▶ DeepgramTranscriber ──▶ text│
//! │                    POST {base_url}/listen     │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use turn_voice::audio::{encode_wav, AudioBuffer};
//! use turn_voice::config::SttConfig;
//! use turn_voice::stt::{DeepgramTranscriber, Transcriber};
//!
//! # async fn demo() {
//! let stt = DeepgramTranscriber::from_config(&SttConfig {
//!     api_key: Some("dg-key".into()),
//!     ..SttConfig::default()
//! });
//! let wav = encode_wav(&AudioBuffer::empty(16_000, 1).unwrap()).unwrap();
//! let text = stt.transcribe(&wav).await.unwrap();
//! assert!(text.is_empty()); // nothing recorded, nothing sent
//! # }
//! ```

pub mod deepgram;
pub mod engine;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use deepgram::DeepgramTranscriber;
pub use engine::{SttError, Transcriber};
