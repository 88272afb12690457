//! Turn orchestrator: record → transcribe → generate → synthesize → play.
//!
//! # Architecture
//!
//! ```text
//! TurnOrchestrator::run()  ← async, one task
//!        │
//!        ├─ spawn_blocking(KeyGate::wait_for_tap)          AwaitingStart
//!        │
//!        └─ loop
//!             ├─ arm listener, spawn_blocking(record_until)  Recording
//!             ├─ arm listener for the reply
//!             │    ├─ Transcriber::transcribe                Transcribing
//!             │    ├─ ReplyGenerator::reply                  Generating
//!             │    ├─ Synthesizer::synthesize → pcm16_to_wav Synthesizing
//!             │    └─ spawn_blocking(play_wav)               Playing
//!             └─ TurnLogger::record
//! ```
//!
//! Recording and the reply each get a fresh stop/shutdown signal pair, so
//! the exit key is honoured while a provider request is in flight.  Provider
//! failures and blank results discard the attempt and go back to recording;
//! only the exit key or a device failure ends the session.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use turn_voice::audio::AudioEngine;
//! use turn_voice::config::AppConfig;
//! use turn_voice::history::JsonlTurnLog;
//! use turn_voice::hotkey::{HotkeyWatcher, RdevKeySource};
//! use turn_voice::llm::OpenAiResponder;
//! use turn_voice::pipeline::{OrchestratorSettings, TurnOrchestrator};
//! use turn_voice::stt::DeepgramTranscriber;
//! use turn_voice::tts::ElevenLabsSynthesizer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let mut orchestrator = TurnOrchestrator::new(
//!         Arc::new(AudioEngine::new(&config.audio)),
//!         Arc::new(HotkeyWatcher::from_config(Arc::new(RdevKeySource), &config.hotkey)),
//!         Arc::new(DeepgramTranscriber::from_config(&config.stt)),
//!         Arc::new(JsonlTurnLog::create(&config.log_dir()).unwrap()),
//!         OrchestratorSettings::from_config(&config),
//!     )
//!     .with_replies(
//!         Arc::new(OpenAiResponder::from_config(&config.llm)),
//!         Arc::new(ElevenLabsSynthesizer::from_config(&config.tts)),
//!     );
//!
//!     let summary = orchestrator.run().await;
//!     println!("{} turns", summary.turns_completed);
//! }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{OrchestratorSettings, TurnOrchestrator};
pub use state::{EndReason, SessionSummary, TurnState};
