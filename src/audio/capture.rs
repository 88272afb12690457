//! Microphone capture via `cpal`.
//!
//! Three capture modes share one stream builder:
//!
//! - [`AudioEngine::record_for`] — fixed duration, blocking.
//! - [`AudioEngine::record_until`] — until a [`CancellationSignal`] fires or
//!   an optional timeout elapses, polling at the engine's poll interval.
//! - [`AudioEngine::stream_chunks`] — fixed-duration PCM chunks through a
//!   bounded queue, consumed lazily as an iterator.
//!
//! The cpal callback runs on a driver-owned thread.  It only converts the
//! block it was handed and forwards it; it never waits on a lock or a full
//! queue.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};

use crate::signal::CancellationSignal;

use super::buffer::f32_to_i16;
use super::device::{open_input, warn_if_unsupported};
use super::queue::{chunk_queue, ChunkProducer, ChunkStream};
use super::{encode_wav, AudioBuffer, AudioEngine, AudioError, WavContainer};

/// Extra time granted to the driver beyond the requested duration in
/// [`AudioEngine::record_for`] before giving up on missing frames.
const RECORD_FOR_GRACE: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Chunker
// ---------------------------------------------------------------------------

/// Packs callback blocks into fixed-size little-endian PCM chunks.
///
/// Blocks rarely line up with chunk boundaries, so the remainder is carried
/// into the next call.  A trailing partial chunk is never emitted.
pub(crate) struct PcmChunker {
    chunk_bytes: usize,
    pending: Vec<u8>,
    producer: ChunkProducer,
}

impl PcmChunker {
    pub(crate) fn new(chunk_bytes: usize, producer: ChunkProducer) -> Self {
        let chunk_bytes = chunk_bytes.max(2);
        Self {
            chunk_bytes,
            pending: Vec::with_capacity(chunk_bytes),
            producer,
        }
    }

    pub(crate) fn push(&mut self, block: &[f32]) {
        for &sample in block {
            self.pending.extend_from_slice(&f32_to_i16(sample).to_le_bytes());
            if self.pending.len() >= self.chunk_bytes {
                let full =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_bytes));
                self.producer.offer(full);
            }
        }
    }

    /// Bytes held back waiting for the rest of a chunk.
    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Block until `cancel` is set (`true`) or `timeout` elapses (`false`),
/// waking every `poll` at most.
pub(crate) fn wait_for_stop(
    cancel: &CancellationSignal,
    poll: Duration,
    timeout: Option<Duration>,
) -> bool {
    let started = Instant::now();
    loop {
        let tick = match timeout {
            Some(limit) => {
                let left = limit.saturating_sub(started.elapsed());
                if left.is_zero() {
                    return cancel.is_set();
                }
                left.min(poll)
            }
            None => poll,
        };
        if cancel.wait_until_set(tick) {
            return true;
        }
    }
}

impl AudioEngine {
    /// Open the resolved input device and start a stream that hands every
    /// callback block to `on_block`.
    ///
    /// Dropping the returned stream stops capture and releases the device.
    fn open_capture<F>(&self, channels: u16, mut on_block: F) -> Result<cpal::Stream, AudioError>
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        let device = open_input(self.selection.input.as_deref())?;
        warn_if_unsupported(&device, true, channels, self.selection.sample_rate);
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(self.selection.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| on_block(data),
            |err: cpal::StreamError| {
                log::error!("cpal input stream error: {err}");
            },
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }

    /// Record exactly `duration` of audio.
    ///
    /// `channels == 0` uses the engine default.
    ///
    /// # Errors
    ///
    /// A device error when no input device is available or the stream cannot
    /// be opened.
    pub fn record_for(&self, duration: Duration, channels: u16) -> Result<WavContainer, AudioError> {
        let channels = self.channels_or_default(channels);
        let rate = self.sample_rate();
        let frames = (rate as f64 * duration.as_secs_f64()).round() as usize;
        let wanted = frames * channels as usize;

        let (tx, rx) = mpsc::channel::<Vec<i16>>();
        let stream = self.open_capture(channels, move |data| {
            let _ = tx.send(data.iter().copied().map(f32_to_i16).collect());
        })?;

        let deadline = Instant::now() + duration + RECORD_FOR_GRACE;
        let mut samples: Vec<i16> = Vec::with_capacity(wanted);
        while samples.len() < wanted && Instant::now() < deadline {
            if let Ok(block) = rx.recv_timeout(self.poll_interval) {
                samples.extend_from_slice(&block);
            }
        }
        drop(stream);

        if samples.len() < wanted {
            log::warn!(
                "record_for: device delivered {} of {wanted} samples",
                samples.len()
            );
        }
        samples.truncate(wanted);
        encode_wav(&AudioBuffer::concat([samples], rate, channels)?)
    }

    /// Record until `cancel` is set or `timeout` elapses.
    ///
    /// Blocks the calling thread on a poll loop so a signal set from another
    /// thread is observed within one poll interval.  A signal that is already
    /// set yields an empty recording without touching the device.
    ///
    /// # Errors
    ///
    /// A device error when no input device is available or the stream cannot
    /// be opened.
    pub fn record_until(
        &self,
        cancel: &CancellationSignal,
        channels: u16,
        timeout: Option<Duration>,
    ) -> Result<WavContainer, AudioError> {
        let channels = self.channels_or_default(channels);
        let rate = self.sample_rate();

        if cancel.is_set() {
            return encode_wav(&AudioBuffer::empty(rate, channels)?);
        }

        let (tx, rx) = mpsc::channel::<Vec<i16>>();
        let stream = self.open_capture(channels, move |data| {
            let _ = tx.send(data.iter().copied().map(f32_to_i16).collect());
        })?;

        if !wait_for_stop(cancel, self.poll_interval, timeout) {
            log::debug!("record_until: timeout after {timeout:?}");
        }
        drop(stream);

        let buffer = AudioBuffer::concat(rx.try_iter(), rate, channels)?;
        log::debug!(
            "record_until: captured {} frames ({:.2} s)",
            buffer.frames(),
            buffer.duration().as_secs_f32()
        );
        encode_wav(&buffer)
    }

    /// Stream `chunk_ms`-long chunks of little-endian PCM until `cancel` fires.
    /// `chunk_ms == 0` uses the configured chunk length.
    ///
    /// The callback fills one fixed-size chunk at a time and offers it to a
    /// bounded queue; when the consumer falls behind the newest chunk is
    /// dropped with a warning.
    ///
    /// # Errors
    ///
    /// A device error when no input device is available or the stream cannot
    /// be opened.
    pub fn stream_chunks(
        &self,
        cancel: &CancellationSignal,
        chunk_ms: u32,
    ) -> Result<ChunkStream, AudioError> {
        let channels = self.channels;
        let chunk_ms = if chunk_ms == 0 { self.chunk_ms } else { chunk_ms };
        let (producer, consumer) = chunk_queue(self.queue_capacity);

        if cancel.is_set() {
            return Ok(ChunkStream::new(consumer, cancel.clone(), None));
        }

        let frames_per_chunk =
            ((self.sample_rate() as u64 * chunk_ms as u64) / 1_000).max(1) as usize;
        let chunk_bytes = frames_per_chunk * channels as usize * 2;

        let mut chunker = PcmChunker::new(chunk_bytes, producer);
        let stream = self.open_capture(channels, move |data| chunker.push(data))?;

        Ok(ChunkStream::new(consumer, cancel.clone(), Some(stream)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::Poll;
    use crate::audio::{decode_wav, DeviceSelection};
    use crate::config::AudioConfig;

    fn deviceless(rate: u32, channels: u16) -> AudioEngine {
        let config = AudioConfig {
            channels,
            ..AudioConfig::default()
        };
        AudioEngine::with_selection(DeviceSelection::none(rate), &config)
    }

    #[test]
    fn pre_cancelled_record_returns_empty_buffer() {
        let engine = deviceless(16_000, 2);
        let cancel = CancellationSignal::new();
        cancel.set();

        let wav = engine.record_until(&cancel, 0, None).unwrap();
        let buffer = decode_wav(&wav).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.sample_rate(), 16_000);
    }

    #[test]
    fn record_without_device_is_device_error() {
        let engine = deviceless(16_000, 1);
        let err = engine
            .record_until(&CancellationSignal::new(), 1, Some(Duration::from_millis(10)))
            .unwrap_err();
        assert!(err.is_device_error());

        let err = engine.record_for(Duration::from_millis(10), 1).unwrap_err();
        assert!(err.is_device_error());
    }

    #[test]
    fn stream_without_device_is_device_error() {
        let engine = deviceless(16_000, 1);
        assert!(matches!(
            engine.stream_chunks(&CancellationSignal::new(), 30),
            Err(AudioError::NoInputDevice)
        ));
    }

    #[test]
    fn chunker_splits_blocks_across_boundaries() {
        let (producer, consumer) = chunk_queue(16);
        // Two mono samples per chunk.
        let mut chunker = PcmChunker::new(4, producer);

        chunker.push(&[0.0, 0.5, -0.5]);
        assert_eq!(chunker.pending(), 2);
        chunker.push(&[1.0, -1.0, 0.25]);
        assert_eq!(chunker.pending(), 0);

        let expected: Vec<u8> = [0.0, 0.5, -0.5, 1.0, -1.0, 0.25]
            .into_iter()
            .flat_map(|s| f32_to_i16(s).to_le_bytes())
            .collect();
        let mut chunks = Vec::new();
        while let Poll::Chunk(chunk) = consumer.recv_timeout(Duration::from_millis(10)) {
            chunks.push(chunk);
        }
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 4));
        assert_eq!(chunks.concat(), expected);
    }

    #[test]
    fn chunker_holds_back_partial_chunk() {
        let (producer, consumer) = chunk_queue(16);
        let mut chunker = PcmChunker::new(6, producer);

        chunker.push(&[0.1; 5]);

        assert_eq!(chunker.pending(), 4);
        assert!(matches!(
            consumer.recv_timeout(Duration::from_millis(10)),
            Poll::Chunk(c) if c.len() == 6
        ));
        assert_eq!(consumer.recv_timeout(Duration::from_millis(10)), Poll::Empty);
    }

    #[test]
    fn wait_for_stop_gives_up_at_timeout() {
        let cancel = CancellationSignal::new();
        let start = Instant::now();

        assert!(!wait_for_stop(
            &cancel,
            Duration::from_millis(20),
            Some(Duration::from_millis(60))
        ));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn wait_for_stop_wakes_when_set_elsewhere() {
        let cancel = CancellationSignal::new();
        let setter = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                cancel.set();
                Instant::now()
            })
        };

        assert!(wait_for_stop(&cancel, Duration::from_millis(20), None));
        let set_at = setter.join().unwrap();
        assert!(set_at.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn pre_cancelled_stream_is_empty() {
        let engine = deviceless(16_000, 1);
        let cancel = CancellationSignal::new();
        cancel.set();
        let stream = engine.stream_chunks(&cancel, 30).unwrap();
        assert_eq!(stream.count(), 0);
    }
}
