//! Turn-based voice assistant.
//!
//! Tap a key, speak, tap again: the recording is transcribed, answered by a
//! language model, synthesized and played back, then the next turn starts.
//! The exit key ends the session from any phase.
//!
//! | Module       | Role                                                   |
//! |--------------|--------------------------------------------------------|
//! | [`signal`]   | one-shot cross-thread cancellation flag                |
//! | [`audio`]    | device resolution, cancelable capture/playback, WAV    |
//! | [`hotkey`]   | global key events, trigger/exit matching with cooldown |
//! | [`stt`]      | speech-to-text provider                                |
//! | [`llm`]      | reply generation provider                              |
//! | [`tts`]      | text-to-speech provider                                |
//! | [`history`]  | append-only turn log                                   |
//! | [`config`]   | TOML settings and environment overrides                |
//! | [`pipeline`] | the turn orchestrator                                  |

pub mod audio;
pub mod config;
pub mod history;
pub mod hotkey;
pub mod llm;
pub mod pipeline;
pub mod signal;
pub mod stt;
pub mod tts;
