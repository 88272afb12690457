//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! keys it changes.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SessionMode
// ---------------------------------------------------------------------------

/// Selects which phases a turn runs.
///
/// | Variant        | Pipeline                                     |
/// |----------------|----------------------------------------------|
/// | Conversation   | record → transcribe → reply → speak → play   |
/// | TranscribeOnly | record → transcribe                          |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Conversation,
    TranscribeOnly,
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for capture and playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture rate in Hz.  `None` resolves it from the devices.
    pub sample_rate: Option<u32>,
    /// Capture channel count.
    pub channels: u16,
    /// Upper bound on a single recording, in seconds.
    pub record_timeout_secs: u64,
    /// Poll interval for cancelable waits, in milliseconds.
    pub poll_ms: u64,
    /// Chunk length for streaming capture, in milliseconds.
    pub chunk_ms: u32,
    /// Bounded queue size between the capture callback and a chunk consumer.
    pub chunk_queue_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            channels: 1,
            record_timeout_secs: 10_000,
            poll_ms: 20,
            chunk_ms: 30,
            chunk_queue_capacity: crate::audio::queue::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Starts the session, stops recording and skips playback (e.g. `"Space"`).
    pub trigger_key: String,
    /// Ends the session from any phase (e.g. `"Escape"`).
    pub exit_key: String,
    /// Trigger presses within this many milliseconds of the last accepted
    /// one are ignored.
    pub cooldown_ms: u64,
    /// Bounded wait for a phase listener to exit, in milliseconds.
    pub join_timeout_ms: u64,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            trigger_key: "Space".into(),
            exit_key: "Escape".into(),
            cooldown_ms: 800,
            join_timeout_ms: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Deepgram pre-recorded transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    pub base_url: String,
    /// Usually supplied through `DEEPGRAM_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    /// BCP-47 language tag (e.g. `"en"`, `"tr"`).
    pub language: String,
    pub smart_format: bool,
    pub punctuate: bool,
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepgram.com/v1".into(),
            api_key: None,
            model: "nova-2".into(),
            language: "en".into(),
            smart_format: true,
            punctuate: true,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// OpenAI Responses API reply generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// Usually supplied through `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    /// System-level instructions sent with every request.
    pub instructions: String,
    pub max_output_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            instructions: "You are a customer service voice assistant. If the conversation \
                           is just starting, introduce yourself briefly. Keep every answer \
                           short and to the point."
                .into(),
            max_output_tokens: 120,
            temperature: 0.4,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// ElevenLabs voice settings, sent verbatim as `voice_settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.0,
            similarity_boost: 1.0,
            style: 0.0,
            use_speaker_boost: true,
            speed: 1.1,
        }
    }
}

/// ElevenLabs text-to-speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub base_url: String,
    /// Usually supplied through `ELEVENLABS_API_KEY`.
    pub api_key: Option<String>,
    pub voice_id: Option<String>,
    pub model: String,
    /// Requested PCM rate; selects the `pcm_<rate>` output format.
    pub sample_rate: u32,
    pub timeout_secs: u64,
    pub voice: VoiceSettings,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io/v1".into(),
            api_key: None,
            voice_id: None,
            model: "eleven_multilingual_v2".into(),
            sample_rate: 16_000,
            timeout_secs: 30,
            voice: VoiceSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Per-session behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: SessionMode,
    /// Directory for turn logs.  `None` means [`AppPaths::logs_dir`].
    pub log_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use turn_voice::config::AppConfig;
///
/// // Load (returns Default when file is missing), then let the
/// // environment fill in credentials.
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env_overrides();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub hotkey: HotkeyConfig,
    pub stt: SttConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`.  Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DEEPGRAM_API_KEY") {
            self.stt.api_key = Some(v);
        }
        if let Some(v) = get("DEEPGRAM_MODEL") {
            self.stt.model = v;
        }
        if let Some(v) = get("DEEPGRAM_LANGUAGE") {
            self.stt.language = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("ELEVENLABS_API_KEY") {
            self.tts.api_key = Some(v);
        }
        if let Some(v) = get("ELEVENLABS_VOICE_ID") {
            self.tts.voice_id = Some(v);
        }
        if let Some(v) = get("ELEVENLABS_MODEL") {
            self.tts.model = v;
        }
        if let Some(v) = get("LOG_DIR") {
            self.session.log_dir = Some(PathBuf::from(v));
        }
    }

    /// Names of the settings the selected mode needs but does not have.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        fn blank(value: &Option<String>) -> bool {
            value.as_deref().map_or(true, |v| v.trim().is_empty())
        }

        let mut missing = Vec::new();
        if blank(&self.stt.api_key) {
            missing.push("DEEPGRAM_API_KEY");
        }
        if self.session.mode == SessionMode::Conversation {
            if blank(&self.llm.api_key) {
                missing.push("OPENAI_API_KEY");
            }
            if blank(&self.tts.api_key) {
                missing.push("ELEVENLABS_API_KEY");
            }
            if blank(&self.tts.voice_id) {
                missing.push("ELEVENLABS_VOICE_ID");
            }
        }
        missing
    }

    /// Fail when a credential the selected mode needs is missing.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_settings();
        if !missing.is_empty() {
            bail!("missing required settings: {}", missing.join(", "));
        }
        Ok(())
    }

    /// Turn log directory after applying the platform default.
    pub fn log_dir(&self) -> PathBuf {
        self.session
            .log_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().logs_dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
