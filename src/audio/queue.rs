//! Bounded hand-off between the capture callback and a streaming consumer.
//!
//! The producer side runs inside the cpal callback, so it must never block:
//! [`ChunkProducer::offer`] uses `try_send` and drops the *newest* chunk when
//! the queue is full.  The consumer polls with a short timeout so it can
//! notice cancellation between chunks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use crate::signal::CancellationSignal;

/// Default capacity of the streaming queue, in chunks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// How long the consumer waits for a chunk before re-checking cancellation.
const CONSUMER_POLL: Duration = Duration::from_millis(100);

/// Create a bounded chunk queue holding at most `capacity` chunks.
pub fn chunk_queue(capacity: usize) -> (ChunkProducer, ChunkConsumer) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        ChunkProducer {
            tx,
            dropped: Arc::clone(&dropped),
        },
        ChunkConsumer { rx, dropped },
    )
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Callback-side handle.  Cheap to clone.
#[derive(Clone)]
pub struct ChunkProducer {
    tx: SyncSender<Vec<u8>>,
    dropped: Arc<AtomicUsize>,
}

impl ChunkProducer {
    /// Enqueue without blocking.  Returns `false` when the chunk was dropped.
    pub fn offer(&self, chunk: Vec<u8>) -> bool {
        match self.tx.try_send(chunk) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("audio chunk queue full, dropped newest chunk ({total} so far)");
                false
            }
            // Consumer gone; the stream is being torn down.
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Consumer-side handle.
pub struct ChunkConsumer {
    rx: Receiver<Vec<u8>>,
    dropped: Arc<AtomicUsize>,
}

/// Outcome of one bounded wait on the queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Poll {
    Chunk(Vec<u8>),
    Empty,
    Closed,
}

impl ChunkConsumer {
    pub fn recv_timeout(&self, timeout: Duration) -> Poll {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Poll::Chunk(chunk),
            Err(RecvTimeoutError::Timeout) => Poll::Empty,
            Err(RecvTimeoutError::Disconnected) => Poll::Closed,
        }
    }

    /// Discard whatever is still queued.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// ChunkStream
// ---------------------------------------------------------------------------

/// Lazy sequence of fixed-duration PCM chunks returned by
/// [`AudioEngine::stream_chunks`](super::AudioEngine::stream_chunks).
///
/// Ends when the cancel signal is set (or the producer disappears).  Ending
/// drops the cpal stream, which releases the input device, and discards any
/// chunks still queued.  A finished stream cannot be resumed; call
/// `stream_chunks` again for a new one.
pub struct ChunkStream {
    consumer: ChunkConsumer,
    cancel: CancellationSignal,
    stream: Option<cpal::Stream>,
    finished: bool,
}

impl ChunkStream {
    pub(crate) fn new(
        consumer: ChunkConsumer,
        cancel: CancellationSignal,
        stream: Option<cpal::Stream>,
    ) -> Self {
        Self {
            consumer,
            cancel,
            stream,
            finished: false,
        }
    }

    /// Chunks dropped so far because the consumer fell behind.
    pub fn dropped(&self) -> usize {
        self.consumer.dropped()
    }

    fn close(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        // Dropping the stream stops the callback before the queue is drained.
        self.stream.take();
        let discarded = self.consumer.drain();
        log::debug!("chunk stream closed ({discarded} queued chunks discarded)");
    }
}

impl Iterator for ChunkStream {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            if self.cancel.is_set() {
                self.close();
                break;
            }
            match self.consumer.recv_timeout(CONSUMER_POLL) {
                Poll::Chunk(chunk) => return Some(chunk),
                Poll::Empty => continue,
                Poll::Closed => self.close(),
            }
        }
        None
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn overflow_drops_newest_without_blocking() {
        let (producer, consumer) = chunk_queue(DEFAULT_QUEUE_CAPACITY);

        let start = Instant::now();
        let accepted: Vec<bool> = (0..11u8).map(|i| producer.offer(vec![i])).collect();
        assert!(start.elapsed() < Duration::from_secs(1));

        assert_eq!(accepted.iter().filter(|a| **a).count(), 10);
        assert!(!accepted[10]);
        assert_eq!(producer.dropped(), 1);
        drop(producer);

        let stream = ChunkStream::new(consumer, CancellationSignal::new(), None);
        let chunks: Vec<Vec<u8>> = stream.collect();
        assert_eq!(chunks.len(), 10);
        // The oldest chunks survive; chunk #10 was the one dropped.
        assert_eq!(chunks.first(), Some(&vec![0u8]));
        assert_eq!(chunks.last(), Some(&vec![9u8]));
    }

    #[test]
    fn cancellation_ends_the_sequence() {
        let (producer, consumer) = chunk_queue(4);
        let cancel = CancellationSignal::new();
        let mut stream = ChunkStream::new(consumer, cancel.clone(), None);

        producer.offer(vec![1, 2]);
        assert_eq!(stream.next(), Some(vec![1, 2]));

        cancel.set();
        producer.offer(vec![3, 4]);
        assert_eq!(stream.next(), None);
        // Finished streams stay finished.
        assert_eq!(stream.next(), None);
        // Queue was drained on close; the producer sees a disconnected queue
        // once the stream is dropped.
        drop(stream);
        assert!(!producer.offer(vec![5]));
    }

    #[test]
    fn consumer_reports_empty_and_closed() {
        let (producer, consumer) = chunk_queue(2);
        assert_eq!(consumer.recv_timeout(Duration::from_millis(5)), Poll::Empty);
        drop(producer);
        assert_eq!(consumer.recv_timeout(Duration::from_millis(5)), Poll::Closed);
    }

    #[test]
    fn concurrent_producer_never_blocks() {
        let (producer, consumer) = chunk_queue(DEFAULT_QUEUE_CAPACITY);
        let handle = std::thread::spawn(move || {
            for i in 0..11u8 {
                producer.offer(vec![i]);
            }
        });
        handle.join().unwrap();

        let mut received = 0;
        while let Poll::Chunk(_) = consumer.recv_timeout(Duration::from_millis(10)) {
            received += 1;
        }
        assert_eq!(received, 10);
        assert_eq!(consumer.dropped(), 1);
    }
}
