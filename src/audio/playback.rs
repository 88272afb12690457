//! Cancelable playback to the resolved output device via `cpal`.
//!
//! Each call spawns an `audio-playback` thread that owns the output stream
//! (cpal streams are not `Send` on every platform) and supervises it: the
//! thread polls for completion and for the optional cancel signal at the
//! engine's poll interval, then drops the stream.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};

use crate::signal::CancellationSignal;

use super::buffer::i16_to_f32;
use super::device::{open_output, warn_if_unsupported};
use super::{decode_wav, AudioBuffer, AudioEngine, AudioError, WavContainer};

/// Slack on top of the buffer duration before a stalled device is abandoned.
const PLAYBACK_GRACE: Duration = Duration::from_secs(2);

/// Read position shared between the output callback and the supervisor.
struct Cursor {
    samples: Vec<f32>,
    position: AtomicUsize,
    finished: AtomicBool,
}

impl AudioEngine {
    /// Play `buffer` on the output device.
    ///
    /// With `cancel`, playback stops within one poll interval of the signal
    /// being set.  With `blocking == false` the call returns as soon as the
    /// stream has started and playback continues in the background.
    ///
    /// # Errors
    ///
    /// A device error when no output device is available or the stream
    /// cannot be opened.  An empty buffer is a no-op.
    pub fn play(
        &self,
        buffer: &AudioBuffer,
        cancel: Option<&CancellationSignal>,
        blocking: bool,
    ) -> Result<(), AudioError> {
        if buffer.is_empty() {
            return Ok(());
        }

        let output = self.selection.output.clone();
        let channels = buffer.channels();
        let rate = buffer.sample_rate();
        let limit = buffer.duration() + PLAYBACK_GRACE;
        let poll = self.poll_interval;
        let cancel = cancel.cloned();
        let cursor = Arc::new(Cursor {
            samples: buffer.samples().iter().copied().map(i16_to_f32).collect(),
            position: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        });

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), AudioError>>(1);
        let worker = std::thread::Builder::new()
            .name("audio-playback".into())
            .spawn(move || {
                let stream = match start_output(output.as_deref(), channels, rate, &cursor) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let started = Instant::now();
                loop {
                    if cursor.finished.load(Ordering::Acquire) {
                        break;
                    }
                    if cancel.as_ref().is_some_and(CancellationSignal::is_set) {
                        log::debug!("playback aborted by cancel signal");
                        break;
                    }
                    if started.elapsed() > limit {
                        log::warn!("playback did not finish within {limit:?}; stopping");
                        break;
                    }
                    std::thread::sleep(poll);
                }
                drop(stream);
            })
            .map_err(|e| AudioError::Device(format!("failed to spawn playback thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                return Err(AudioError::Device(
                    "playback thread exited before starting".into(),
                ))
            }
        }

        if blocking && worker.join().is_err() {
            log::error!("audio-playback thread panicked");
        }
        Ok(())
    }

    /// Decode a 16-bit PCM WAV and play it.  An empty container is a no-op.
    ///
    /// # Errors
    ///
    /// [`AudioError::UnsupportedFormat`] for any sample width other than
    /// 16 bits, plus everything [`play`](Self::play) can return.
    pub fn play_wav(
        &self,
        wav: &WavContainer,
        cancel: Option<&CancellationSignal>,
        blocking: bool,
    ) -> Result<(), AudioError> {
        if wav.is_empty() {
            return Ok(());
        }
        let buffer = decode_wav(wav)?;
        self.play(&buffer, cancel, blocking)
    }

    /// Play raw little-endian PCM bytes.  `None` rate/channels fall back to
    /// the engine defaults.  Empty input is a no-op.
    pub fn play_pcm16(
        &self,
        pcm: &[u8],
        sample_rate: Option<u32>,
        channels: Option<u16>,
        cancel: Option<&CancellationSignal>,
        blocking: bool,
    ) -> Result<(), AudioError> {
        if pcm.is_empty() {
            return Ok(());
        }
        let buffer = AudioBuffer::from_pcm_bytes(
            pcm,
            sample_rate.unwrap_or(self.sample_rate()),
            channels.unwrap_or(self.channels),
        )?;
        self.play(&buffer, cancel, blocking)
    }
}

/// Open the output device and start a stream that reads from `cursor`.
fn start_output(
    name: Option<&str>,
    channels: u16,
    rate: u32,
    cursor: &Arc<Cursor>,
) -> Result<cpal::Stream, AudioError> {
    let device = open_output(name)?;
    warn_if_unsupported(&device, false, channels, rate);
    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let cursor = Arc::clone(cursor);
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let start = cursor.position.load(Ordering::Relaxed);
            let available = cursor.samples.len().saturating_sub(start);
            let n = available.min(data.len());
            data[..n].copy_from_slice(&cursor.samples[start..start + n]);
            data[n..].fill(0.0);
            cursor.position.store(start + n, Ordering::Relaxed);
            if start + n >= cursor.samples.len() {
                cursor.finished.store(true, Ordering::Release);
            }
        },
        |err: cpal::StreamError| {
            log::error!("cpal output stream error: {err}");
        },
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{encode_wav, DeviceSelection};
    use crate::config::AudioConfig;
    use std::io::Cursor as IoCursor;

    fn deviceless() -> AudioEngine {
        AudioEngine::with_selection(DeviceSelection::none(16_000), &AudioConfig::default())
    }

    #[test]
    fn empty_inputs_are_no_ops() {
        let engine = deviceless();
        engine
            .play(&AudioBuffer::empty(16_000, 1).unwrap(), None, true)
            .unwrap();
        engine.play_wav(&WavContainer::default(), None, true).unwrap();
        engine.play_pcm16(&[], None, None, None, true).unwrap();
    }

    #[test]
    fn missing_output_device_is_device_error() {
        let engine = deviceless();
        let buffer = AudioBuffer::silence(Duration::from_millis(50), 16_000, 1).unwrap();
        let err = engine
            .play_wav(&encode_wav(&buffer).unwrap(), None, true)
            .unwrap_err();
        assert!(matches!(err, AudioError::NoOutputDevice));
    }

    #[test]
    fn non_16_bit_wav_is_rejected_before_opening_device() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = IoCursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0.25f32).unwrap();
            writer.finalize().unwrap();
        }
        let wav = WavContainer::from_bytes(cursor.into_inner());

        let err = deviceless()
            .play_wav(&wav, Some(&CancellationSignal::new()), true)
            .unwrap_err();
        assert!(matches!(
            err,
            AudioError::UnsupportedFormat {
                bits_per_sample: 32
            }
        ));
    }

    #[test]
    fn odd_pcm_is_invalid_buffer() {
        let err = deviceless()
            .play_pcm16(&[1, 2, 3], None, None, None, false)
            .unwrap_err();
        assert!(matches!(err, AudioError::InvalidBuffer(_)));
    }
}
