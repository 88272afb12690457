//! One-shot cancellation flag shared between the orchestrator, the hotkey
//! listener threads and the audio engine.
//!
//! A [`CancellationSignal`] starts unset and can only ever move to set.  There
//! is no `reset`; each phase builds a fresh signal, and a key press seen by
//! one phase never reaches the next.
//!
//! ```
//! use std::time::Duration;
//! use turn_voice::signal::CancellationSignal;
//!
//! let stop = CancellationSignal::new();
//! let observer = stop.clone();
//!
//! assert!(!observer.wait_until_set(Duration::from_millis(5)));
//! stop.set();
//! assert!(observer.is_set());
//! assert!(observer.wait_until_set(Duration::from_secs(10))); // returns at once
//! ```

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

struct Inner {
    flag: Mutex<bool>,
    cvar: Condvar,
}

/// Cloneable handle to a monotonic unset → set flag.
///
/// Clones observe the same flag; the signal lives as long as any clone.
#[derive(Clone)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: Mutex::new(false),
                cvar: Condvar::new(),
            }),
        }
    }

    /// Set the flag and wake every waiter.  Idempotent.
    pub fn set(&self) {
        let mut flag = self.inner.flag.lock().unwrap_or_else(PoisonError::into_inner);
        if !*flag {
            *flag = true;
            self.inner.cvar.notify_all();
        }
    }

    pub fn is_set(&self) -> bool {
        *self.inner.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for at most `timeout` waiting for the flag.
    ///
    /// Returns `true` if the flag is set when the call returns.  Spurious
    /// wake-ups are absorbed by `wait_timeout_while`.
    pub fn wait_until_set(&self, timeout: Duration) -> bool {
        let flag = self.inner.flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (flag, _) = self
            .inner
            .cvar
            .wait_timeout_while(flag, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        *flag
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("set", &self.is_set())
            .finish()
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
    fn starts_unset() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_set());
    }

    #[test]
    fn set_is_idempotent_and_never_reverts() {
        let signal = CancellationSignal::new();
        signal.set();
        signal.set();
        assert!(signal.is_set());
        for _ in 0..10 {
            assert!(signal.is_set());
        }
    }

    #[test]
    fn clones_share_state() {
        let a = CancellationSignal::new();
        let b = a.clone();
        b.set();
        assert!(a.is_set());
    }

    #[test]
    fn wait_times_out_when_never_set() {
        let signal = CancellationSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_until_set(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn wait_returns_immediately_when_already_set() {
        let signal = CancellationSignal::new();
        signal.set();
        let start = Instant::now();
        assert!(signal.wait_until_set(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_wakes_on_set_from_other_thread() {
        let signal = CancellationSignal::new();
        let setter = signal.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            setter.set();
        });

        assert!(signal.wait_until_set(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn concurrent_setters_all_observe_set() {
        let signal = CancellationSignal::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = signal.clone();
                std::thread::spawn(move || {
                    s.set();
                    assert!(s.is_set());
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(signal.is_set());
    }

    #[test]
    fn signal_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CancellationSignal>();
    }
}
