//! [`AudioEngine`] — device-level capture and playback with cancellation.
//!
//! The engine itself holds only immutable configuration (the resolved
//! [`DeviceSelection`] and a few timing knobs).  Record and playback
//! operations live in [`capture`](super::capture) and
//! [`playback`](super::playback); each one opens its own cpal stream and
//! drops it before returning.

use std::time::Duration;

use thiserror::Error;

use crate::config::AudioConfig;
use crate::signal::CancellationSignal;

use super::device::{resolve_devices, DeviceSelection};
use super::WavContainer;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Errors raised by the audio subsystem.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio input device available")]
    NoInputDevice,

    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The WAV payload is not 16-bit integer PCM.
    #[error("unsupported WAV format: {bits_per_sample}-bit samples (expected 16-bit PCM)")]
    UnsupportedFormat { bits_per_sample: u16 },

    #[error("invalid audio buffer: {0}")]
    InvalidBuffer(String),

    #[error("WAV codec error: {0}")]
    Wav(#[from] hound::Error),
}

impl AudioError {
    /// `true` for hardware failures (device missing or refusing a stream).
    ///
    /// These end the enclosing operation and are never retried internally.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            AudioError::NoInputDevice
                | AudioError::NoOutputDevice
                | AudioError::Device(_)
                | AudioError::DefaultConfig(_)
                | AudioError::BuildStream(_)
                | AudioError::PlayStream(_)
        )
    }
}

// ---------------------------------------------------------------------------
// AudioIo
// ---------------------------------------------------------------------------

/// The slice of [`AudioEngine`] the turn orchestrator depends on.
///
/// Object-safe so the orchestrator can hold an `Arc<dyn AudioIo>` and tests
/// can substitute a scripted implementation.
pub trait AudioIo: Send + Sync {
    /// Capture until `cancel` is set or `timeout` elapses.
    fn record_until(
        &self,
        cancel: &CancellationSignal,
        channels: u16,
        timeout: Option<Duration>,
    ) -> Result<WavContainer, AudioError>;

    /// Play a 16-bit PCM WAV, aborting early when `cancel` fires.
    fn play_wav(
        &self,
        wav: &WavContainer,
        cancel: Option<&CancellationSignal>,
        blocking: bool,
    ) -> Result<(), AudioError>;
}

// ---------------------------------------------------------------------------
// AudioEngine
// ---------------------------------------------------------------------------

/// Owns the resolved devices and timing configuration.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use turn_voice::audio::AudioEngine;
/// use turn_voice::config::AudioConfig;
/// use turn_voice::signal::CancellationSignal;
///
/// let engine = AudioEngine::new(&AudioConfig::default());
/// let stop = CancellationSignal::new();
/// let wav = engine
///     .record_until(&stop, 1, Some(Duration::from_secs(3)))
///     .unwrap();
/// engine.play_wav(&wav, None, true).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct AudioEngine {
    pub(crate) selection: DeviceSelection,
    pub(crate) channels: u16,
    pub(crate) poll_interval: Duration,
    pub(crate) queue_capacity: usize,
    pub(crate) chunk_ms: u32,
}

impl AudioEngine {
    /// Resolve devices from the system defaults and apply `config`.
    ///
    /// An explicit `config.sample_rate` overrides the resolved rate.
    pub fn new(config: &AudioConfig) -> Self {
        Self::with_selection(resolve_devices(), config)
    }

    /// Build an engine from an already-resolved selection.
    pub fn with_selection(mut selection: DeviceSelection, config: &AudioConfig) -> Self {
        if let Some(rate) = config.sample_rate.filter(|r| *r > 0) {
            selection.sample_rate = rate;
        }
        Self {
            selection,
            channels: config.channels.max(1),
            poll_interval: Duration::from_millis(config.poll_ms.max(1)),
            queue_capacity: config.chunk_queue_capacity.max(1),
            chunk_ms: config.chunk_ms.max(1),
        }
    }

    /// Sample rate used for capture.
    pub fn sample_rate(&self) -> u32 {
        self.selection.sample_rate
    }

    /// Default channel count for capture.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn selection(&self) -> &DeviceSelection {
        &self.selection
    }

    /// Channel count to use when the caller passes `0`.
    pub(crate) fn channels_or_default(&self, channels: u16) -> u16 {
        if channels == 0 {
            self.channels
        } else {
            channels
        }
    }
}

impl AudioIo for AudioEngine {
    fn record_until(
        &self,
        cancel: &CancellationSignal,
        channels: u16,
        timeout: Option<Duration>,
    ) -> Result<WavContainer, AudioError> {
        AudioEngine::record_until(self, cancel, channels, timeout)
    }

    fn play_wav(
        &self,
        wav: &WavContainer,
        cancel: Option<&CancellationSignal>,
        blocking: bool,
    ) -> Result<(), AudioError> {
        AudioEngine::play_wav(self, wav, cancel, blocking)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_rate_overrides_resolved_rate() {
        let config = AudioConfig {
            sample_rate: Some(24_000),
            ..AudioConfig::default()
        };
        let engine = AudioEngine::with_selection(DeviceSelection::none(48_000), &config);
        assert_eq!(engine.sample_rate(), 24_000);
    }

    #[test]
    fn resolved_rate_kept_without_override() {
        let engine =
            AudioEngine::with_selection(DeviceSelection::none(44_100), &AudioConfig::default());
        assert_eq!(engine.sample_rate(), 44_100);
        assert_eq!(engine.channels(), 1);
        assert_eq!(engine.channels_or_default(0), 1);
        assert_eq!(engine.channels_or_default(2), 2);
    }

    #[test]
    fn device_errors_are_classified() {
        assert!(AudioError::NoInputDevice.is_device_error());
        assert!(AudioError::Device("gone".into()).is_device_error());
        assert!(!AudioError::UnsupportedFormat { bits_per_sample: 8 }.is_device_error());
        assert!(!AudioError::InvalidBuffer("x".into()).is_device_error());
    }

    #[test]
    fn engine_is_usable_behind_dyn_audio_io() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AudioEngine>();
        let engine =
            AudioEngine::with_selection(DeviceSelection::none(16_000), &AudioConfig::default());
        let _: Box<dyn AudioIo> = Box::new(engine);
    }
}
