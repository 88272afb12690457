//! Configuration module for the turn-based voice assistant.
//!
//! Provides `AppConfig` (top-level settings), one sub-config per subsystem,
//! `AppPaths` for cross-platform directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.  Provider credentials are usually
//! supplied through the environment (`AppConfig::apply_env_overrides`).

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, HotkeyConfig, LlmConfig, SessionConfig, SessionMode, SttConfig,
    TtsConfig, VoiceSettings,
};
