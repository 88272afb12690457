//! Audio engine — device resolution, capture, playback and the WAV codec.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → Vec<i16> blocks (mpsc) → AudioBuffer → encode_wav
//!                            ↘ fixed-size chunks → bounded queue → ChunkStream
//!
//! WavContainer → decode_wav → AudioBuffer → playback thread → cpal output
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use turn_voice::audio::{decode_wav, AudioEngine};
//! use turn_voice::config::AudioConfig;
//! use turn_voice::signal::CancellationSignal;
//!
//! let engine = AudioEngine::new(&AudioConfig::default());
//! let wav = engine.record_for(Duration::from_secs(2), 1).unwrap();
//! println!("{} frames", decode_wav(&wav).unwrap().frames());
//!
//! let stop = CancellationSignal::new();
//! for chunk in engine.stream_chunks(&stop, 30).unwrap().take(10) {
//!     println!("chunk of {} bytes", chunk.len());
//! }
//! ```

pub mod buffer;
pub mod capture;
pub mod device;
pub mod engine;
pub mod playback;
pub mod queue;
pub mod wav;

pub use buffer::AudioBuffer;
pub use device::{resolve_devices, DeviceSelection, FALLBACK_SAMPLE_RATE};
pub use engine::{AudioEngine, AudioError, AudioIo};
pub use queue::{chunk_queue, ChunkConsumer, ChunkProducer, ChunkStream};
pub use wav::{decode_wav, encode_wav, pcm16_to_wav, WavContainer};
