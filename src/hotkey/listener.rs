//! Key event sources.
//!
//! [`RdevKeySource`] owns the process-wide `rdev::listen` thread and fans
//! events out to subscribers over `std::sync::mpsc` channels.  Subscribers
//! that hang up are pruned on the next event.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**.  The listening thread is
//! started on the first subscription and stays blocked in the rdev event loop
//! until the process exits.  When no one is subscribed it only walks an empty
//! list per event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, Once, PoisonError};

use super::HotkeyEvent;

// ---------------------------------------------------------------------------
// KeySource
// ---------------------------------------------------------------------------

/// Anything that can deliver global key events.
///
/// Each call to [`subscribe`](KeySource::subscribe) returns a fresh receiver
/// that sees every event delivered after the call.  A disconnected receiver
/// means the source is gone for good.
pub trait KeySource: Send + Sync {
    fn subscribe(&self) -> Receiver<HotkeyEvent>;
}

// ---------------------------------------------------------------------------
// RdevKeySource
// ---------------------------------------------------------------------------

static SUBSCRIBERS: Mutex<Vec<Sender<HotkeyEvent>>> = Mutex::new(Vec::new());
static START: Once = Once::new();
static FAILED: AtomicBool = AtomicBool::new(false);

/// Handle to the global `rdev` listener.  Zero-sized; every instance shares
/// the same listening thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct RdevKeySource;

impl RdevKeySource {
    fn ensure_started() {
        START.call_once(|| {
            let spawned = std::thread::Builder::new()
                .name("hotkey-listener".into())
                .spawn(|| {
                    let result = rdev::listen(|event| {
                        if let Some(ev) = HotkeyEvent::from_rdev(&event.event_type) {
                            broadcast(ev);
                        }
                    });

                    if let Err(e) = result {
                        log::error!("hotkey-listener: rdev::listen exited with error: {:?}", e);
                    }
                    // Either way no more events will arrive.
                    FAILED.store(true, Ordering::SeqCst);
                    lock_subscribers().clear();
                });

            if let Err(e) = spawned {
                log::error!("failed to spawn hotkey-listener thread: {e}");
                FAILED.store(true, Ordering::SeqCst);
            }
        });
    }
}

impl KeySource for RdevKeySource {
    fn subscribe(&self) -> Receiver<HotkeyEvent> {
        Self::ensure_started();
        let (tx, rx) = mpsc::channel();
        // Dropping `tx` right away hands back an already-disconnected receiver.
        if !FAILED.load(Ordering::SeqCst) {
            lock_subscribers().push(tx);
        }
        rx
    }
}

fn lock_subscribers() -> std::sync::MutexGuard<'static, Vec<Sender<HotkeyEvent>>> {
    SUBSCRIBERS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn broadcast(event: HotkeyEvent) {
    lock_subscribers().retain(|tx| tx.send(event).is_ok());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
