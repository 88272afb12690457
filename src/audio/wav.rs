//! RIFF/WAVE container for 16-bit PCM, backed by `hound`.
//!
//! [`encode_wav`] and [`decode_wav`] are pure and exact inverses for any
//! valid [`AudioBuffer`]: no resampling, dithering or clipping happens here.

use std::io::Cursor;

use super::{AudioBuffer, AudioError};

// ---------------------------------------------------------------------------
// WavContainer
// ---------------------------------------------------------------------------

/// The bytes of a complete WAV file (`RIFF` header, `fmt ` and `data` chunks).
///
/// This is the only binary format exchanged with the transcription provider
/// and the playback path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WavContainer(Vec<u8>);

impl WavContainer {
    /// Wrap bytes that are expected to hold a WAV file.  Nothing is validated
    /// until [`decode_wav`] runs.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `false` for an empty container or a well-formed WAV whose `data`
    /// chunk holds no samples.  Unparseable bytes count as audio.
    pub fn has_samples(&self) -> bool {
        if self.0.is_empty() {
            return false;
        }
        hound::WavReader::new(Cursor::new(self.as_bytes()))
            .map(|reader| reader.len() > 0)
            .unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Serialise `buffer` as a 16-bit PCM WAV file.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<WavContainer, AudioError> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + buffer.samples().len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in buffer.samples() {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(WavContainer(cursor.into_inner()))
}

/// Parse a WAV file back into an [`AudioBuffer`].
///
/// # Errors
///
/// - [`AudioError::UnsupportedFormat`] when the payload is not 16-bit integer
///   PCM.
/// - [`AudioError::Wav`] when the bytes are not a readable WAV file.
pub fn decode_wav(container: &WavContainer) -> Result<AudioBuffer, AudioError> {
    let mut reader = hound::WavReader::new(Cursor::new(container.as_bytes()))?;
    let spec = reader.spec();

    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(AudioError::UnsupportedFormat {
            bits_per_sample: spec.bits_per_sample,
        });
    }

    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    AudioBuffer::new(samples, spec.sample_rate, spec.channels)
}

/// Wrap raw little-endian PCM bytes (as returned by speech synthesis) in a
/// WAV container.
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<WavContainer, AudioError> {
    encode_wav(&AudioBuffer::from_pcm_bytes(pcm, sample_rate, channels)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: u16) -> AudioBuffer {
        let samples = (0..frames * channels as usize)
            .map(|i| (i as i32 * 977 % 65_536 - 32_768) as i16)
            .collect();
        AudioBuffer::new(samples, 22_050, channels).unwrap()
    }

    #[test]
    fn header_only_wav_has_no_samples() {
        let empty = encode_wav(&AudioBuffer::empty(16_000, 1).unwrap()).unwrap();
        assert!(!empty.is_empty());
        assert!(!empty.has_samples());
        assert!(!WavContainer::default().has_samples());
        assert!(encode_wav(&ramp(10, 1)).unwrap().has_samples());
    }

    #[test]
    fn mono_round_trip_is_exact() {
        let original = ramp(1_000, 1);
        let decoded = decode_wav(&encode_wav(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn stereo_round_trip_preserves_interleaving_and_extremes() {
        let mut samples = vec![i16::MIN, i16::MAX, -1, 1];
        samples.extend(ramp(257, 2).into_samples());
        let original = AudioBuffer::new(samples, 44_100, 2).unwrap();

        let decoded = decode_wav(&encode_wav(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_buffer_round_trips() {
        let original = AudioBuffer::empty(16_000, 1).unwrap();
        let wav = encode_wav(&original).unwrap();
        assert!(!wav.is_empty()); // header only
        assert_eq!(decode_wav(&wav).unwrap(), original);
    }

    #[test]
    fn header_carries_rate_and_channels() {
        let wav = encode_wav(&ramp(10, 2)).unwrap();
        let bytes = wav.as_bytes();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 2);
        assert_eq!(
            u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
            22_050
        );
    }

    #[test]
    fn non_16_bit_payload_is_rejected() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(3i8).unwrap();
            writer.finalize().unwrap();
        }

        let err = decode_wav(&WavContainer::from_bytes(cursor.into_inner())).unwrap_err();
        assert!(matches!(
            err,
            AudioError::UnsupportedFormat { bits_per_sample: 8 }
        ));
    }

    #[test]
    fn garbage_is_a_wav_error() {
        let err = decode_wav(&WavContainer::from_bytes(b"not a wav".to_vec())).unwrap_err();
        assert!(matches!(err, AudioError::Wav(_)));
    }

    #[test]
    fn pcm16_to_wav_wraps_synth_output() {
        let pcm = vec![0u8; 3_200]; // 100 ms of 16 kHz mono silence
        let wav = pcm16_to_wav(&pcm, 16_000, 1).unwrap();
        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.frames(), 1_600);
        assert_eq!(decoded.sample_rate(), 16_000);
    }
}
