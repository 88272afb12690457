//! Interleaved 16-bit PCM audio buffer.
//!
//! [`AudioBuffer`] is what the capture side produces, what the WAV codec
//! serialises and what playback consumes.  Samples are interleaved by channel
//! (`L R L R …` for stereo), so the sample count is always a whole multiple
//! of the channel count.
//!
//! # Example
//!
//! ```rust
//! use turn_voice::audio::AudioBuffer;
//!
//! let buf = AudioBuffer::new(vec![1, -1, 2, -2], 16_000, 2).unwrap();
//! assert_eq!(buf.frames(), 2);
//! assert!(AudioBuffer::new(vec![1, 2, 3], 16_000, 2).is_err());
//! ```

use std::time::Duration;

use super::AudioError;

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// Signed 16-bit PCM samples tagged with their sample rate and channel count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Build a buffer, validating rate, channel count and frame alignment.
    ///
    /// # Errors
    ///
    /// [`AudioError::InvalidBuffer`] when `sample_rate` or `channels` is zero,
    /// or when `samples.len()` is not a multiple of `channels`.
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidBuffer("sample rate must be > 0".into()));
        }
        if channels == 0 {
            return Err(AudioError::InvalidBuffer("channel count must be > 0".into()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(AudioError::InvalidBuffer(format!(
                "{} samples do not divide into {channels} channels",
                samples.len()
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// A zero-length buffer.  Used when a recording is cancelled before the
    /// device delivered anything.
    pub fn empty(sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        Self::new(Vec::new(), sample_rate, channels)
    }

    /// `duration` worth of digital silence.
    pub fn silence(duration: Duration, sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        let frames = (sample_rate as f64 * duration.as_secs_f64()).round() as usize;
        Self::new(vec![0; frames * channels as usize], sample_rate, channels)
    }

    /// Concatenate captured callback blocks into one buffer.
    pub fn concat(
        blocks: impl IntoIterator<Item = Vec<i16>>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioError> {
        let mut samples = Vec::new();
        for block in blocks {
            samples.extend_from_slice(&block);
        }
        // A driver can hand over a trailing partial frame when the stream is
        // torn down mid-callback; keep whole frames only.
        let whole = samples.len() - samples.len() % channels.max(1) as usize;
        samples.truncate(whole);
        Self::new(samples, sample_rate, channels)
    }

    /// Interpret little-endian 16-bit PCM bytes.
    ///
    /// # Errors
    ///
    /// [`AudioError::InvalidBuffer`] for an odd byte count or misaligned frames.
    pub fn from_pcm_bytes(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        if bytes.len() % 2 != 0 {
            return Err(AudioError::InvalidBuffer(format!(
                "odd PCM byte count ({}) for 16-bit samples",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, sample_rate, channels)
    }

    /// Little-endian 16-bit PCM bytes.
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.frames() as u64 * 1_000_000_000 / self.sample_rate as u64)
    }
}

// ---------------------------------------------------------------------------
// Sample conversion
// ---------------------------------------------------------------------------

/// Convert a device `f32` sample in `[-1.0, 1.0]` to `i16`, clamping overshoot.
pub(crate) fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Convert an `i16` sample to the `f32` range cpal output streams expect.
pub(crate) fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_misaligned_samples() {
        let err = AudioBuffer::new(vec![0; 5], 16_000, 2).unwrap_err();
        assert!(matches!(err, AudioError::InvalidBuffer(_)));
    }

    #[test]
    fn rejects_zero_rate_and_channels() {
        assert!(AudioBuffer::new(vec![], 0, 1).is_err());
        assert!(AudioBuffer::new(vec![], 16_000, 0).is_err());
    }

    #[test]
    fn empty_keeps_channel_count() {
        let buf = AudioBuffer::empty(48_000, 2).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.frames(), 0);
    }

    #[test]
    fn silence_has_expected_length() {
        let buf = AudioBuffer::silence(Duration::from_millis(100), 16_000, 1).unwrap();
        assert_eq!(buf.frames(), 1_600);
        assert!(buf.samples().iter().all(|&s| s == 0));
        assert_eq!(buf.duration().as_millis(), 100);
    }

    #[test]
    fn concat_joins_blocks_in_order() {
        let buf = AudioBuffer::concat(vec![vec![1, 2], vec![3, 4], vec![]], 8_000, 2).unwrap();
        assert_eq!(buf.samples(), &[1, 2, 3, 4]);
        assert_eq!(buf.frames(), 2);
    }

    #[test]
    fn concat_drops_trailing_partial_frame() {
        let buf = AudioBuffer::concat(vec![vec![1, 2, 3]], 8_000, 2).unwrap();
        assert_eq!(buf.samples(), &[1, 2]);
    }

    #[test]
    fn pcm_bytes_are_little_endian() {
        let buf = AudioBuffer::from_pcm_bytes(&[0x01, 0x00, 0xff, 0xff], 16_000, 1).unwrap();
        assert_eq!(buf.samples(), &[1, -1]);
        assert_eq!(buf.to_pcm_bytes(), vec![0x01, 0x00, 0xff, 0xff]);
    }

    #[test]
    fn odd_pcm_byte_count_is_rejected() {
        assert!(AudioBuffer::from_pcm_bytes(&[0, 1, 2], 16_000, 1).is_err());
    }

    #[test]
    fn sample_conversion_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
        assert!((i16_to_f32(i16::MAX) - 1.0).abs() < f32::EPSILON);
    }
}
