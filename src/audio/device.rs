//! Input/output device resolution.
//!
//! Devices are resolved once, when an [`AudioEngine`](super::AudioEngine) is
//! built, and the result is kept as plain names plus a sample rate.  Streams
//! are opened per operation by looking the names up again, so no device
//! handle outlives a single record or playback call.
//!
//! Resolution order for each direction:
//!
//! 1. the host's default device,
//! 2. the first enumerated device that exposes channels in that direction.
//!
//! The sample rate is the lower of the two devices' default rates, whichever
//! one is known, or [`FALLBACK_SAMPLE_RATE`].

use cpal::traits::{DeviceTrait, HostTrait};

use super::AudioError;

/// Sample rate used when neither device reports a default configuration.
pub const FALLBACK_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// DeviceSelection
// ---------------------------------------------------------------------------

/// Immutable result of device resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSelection {
    /// Input device name, `None` when the host has no capture device.
    pub input: Option<String>,
    /// Output device name, `None` when the host has no playback device.
    pub output: Option<String>,
    /// Sample rate used for capture and as the playback default.
    pub sample_rate: u32,
}

impl DeviceSelection {
    /// A selection that names no devices.  Useful for hardware-free tests:
    /// every stream operation fails with a device error.
    pub fn none(sample_rate: u32) -> Self {
        Self {
            input: None,
            output: None,
            sample_rate,
        }
    }
}

/// Resolve devices and sample rate from the default cpal host.
pub fn resolve_devices() -> DeviceSelection {
    resolve_on(&cpal::default_host())
}

fn resolve_on(host: &cpal::Host) -> DeviceSelection {
    let input = host.default_input_device().or_else(|| {
        host.input_devices().ok().and_then(|mut devices| {
            devices.find(|d| {
                d.supported_input_configs()
                    .map(|mut cfgs| cfgs.any(|c| c.channels() > 0))
                    .unwrap_or(false)
            })
        })
    });
    let output = host.default_output_device().or_else(|| {
        host.output_devices().ok().and_then(|mut devices| {
            devices.find(|d| {
                d.supported_output_configs()
                    .map(|mut cfgs| cfgs.any(|c| c.channels() > 0))
                    .unwrap_or(false)
            })
        })
    });

    let input_rate = input
        .as_ref()
        .and_then(|d| d.default_input_config().ok())
        .map(|c| c.sample_rate().0);
    let output_rate = output
        .as_ref()
        .and_then(|d| d.default_output_config().ok())
        .map(|c| c.sample_rate().0);

    let selection = DeviceSelection {
        input: input.and_then(|d| d.name().ok()),
        output: output.and_then(|d| d.name().ok()),
        sample_rate: pick_sample_rate(input_rate, output_rate),
    };
    log::info!(
        "audio devices: input={:?} output={:?} rate={} Hz",
        selection.input,
        selection.output,
        selection.sample_rate
    );
    selection
}

/// Combine the two default rates.
pub(crate) fn pick_sample_rate(input: Option<u32>, output: Option<u32>) -> u32 {
    match (input, output) {
        (Some(i), Some(o)) => i.min(o),
        (Some(r), None) | (None, Some(r)) => r,
        (None, None) => FALLBACK_SAMPLE_RATE,
    }
}

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

/// Look up the resolved input device by name.
pub(crate) fn open_input(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let name = name.ok_or(AudioError::NoInputDevice)?;
    let host = cpal::default_host();
    let found = host
        .input_devices()
        .map_err(|e| AudioError::Device(format!("cannot enumerate input devices: {e}")))?
        .find(|d| d.name().map(|n| n == name).unwrap_or(false));
    found.ok_or(AudioError::NoInputDevice)
}

/// Look up the resolved output device by name.
pub(crate) fn open_output(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let name = name.ok_or(AudioError::NoOutputDevice)?;
    let host = cpal::default_host();
    let found = host
        .output_devices()
        .map_err(|e| AudioError::Device(format!("cannot enumerate output devices: {e}")))?
        .find(|d| d.name().map(|n| n == name).unwrap_or(false));
    found.ok_or(AudioError::NoOutputDevice)
}

// ---------------------------------------------------------------------------
// Format check
// ---------------------------------------------------------------------------

/// `(channels, min_rate, max_rate)` of one advertised `f32` config range.
pub(crate) type RateRange = (u16, u32, u32);

/// Whether any advertised range covers `channels` at `rate`.
pub(crate) fn offers(ranges: &[RateRange], channels: u16, rate: u32) -> bool {
    ranges
        .iter()
        .any(|&(ch, min, max)| ch == channels && (min..=max).contains(&rate))
}

fn f32_ranges(configs: impl Iterator<Item = cpal::SupportedStreamConfigRange>) -> Vec<RateRange> {
    configs
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .map(|c| (c.channels(), c.min_sample_rate().0, c.max_sample_rate().0))
        .collect()
}

/// Log when the device does not advertise the stream we are about to open.
/// The stream is still attempted; some hosts convert formats themselves.
pub(crate) fn warn_if_unsupported(device: &cpal::Device, input: bool, channels: u16, rate: u32) {
    let (direction, ranges, default) = if input {
        (
            "input",
            device.supported_input_configs().map(f32_ranges),
            device.default_input_config().ok(),
        )
    } else {
        (
            "output",
            device.supported_output_configs().map(f32_ranges),
            device.default_output_config().ok(),
        )
    };
    let Ok(ranges) = ranges else {
        return;
    };
    if !offers(&ranges, channels, rate) {
        log::warn!(
            "{direction} device {:?} does not advertise {channels} ch @ {rate} Hz f32 \
             (default config: {default:?}); opening anyway",
            device.name().unwrap_or_default()
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
