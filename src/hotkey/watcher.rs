//! Trigger/exit key matching with a cooldown window.
//!
//! A single physical tap can surface as several logical presses during fast
//! interactive use (auto-repeat, or the press that stopped recording landing
//! again on the freshly armed playback listener).  Every accepted trigger
//! press starts a cooldown; trigger presses inside it are ignored and the
//! listener keeps running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::HotkeyConfig;
use crate::signal::CancellationSignal;

use super::{parse_key, HotkeyEvent, KeySource, KeyTransition};

/// Receive timeout for every key wait; a phase listener re-checks whether
/// it has been retired at this interval.
const LISTENER_POLL: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// KeyGate
// ---------------------------------------------------------------------------

/// The hotkey operations the turn orchestrator depends on.
pub trait KeyGate: Send + Sync {
    /// Block until the trigger key is tapped (`true`) or the exit key is
    /// pressed (`false`).
    fn wait_for_tap(&self) -> bool;

    /// Start a background listener for one phase.
    ///
    /// Trigger press outside the cooldown: sets `stop`.  Exit press: sets
    /// `shutdown` and `stop`.  Either way the listener then ends.
    fn arm_stop_on_next_press(
        &self,
        stop: &CancellationSignal,
        shutdown: &CancellationSignal,
    ) -> std::io::Result<ListenerHandle>;
}

// ---------------------------------------------------------------------------
// Cooldown
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Cooldown {
    period: Duration,
    until: Mutex<Option<Instant>>,
}

impl Cooldown {
    fn start(&self) {
        if self.period.is_zero() {
            return;
        }
        *self.until.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Instant::now() + self.period);
    }

    fn active(&self) -> bool {
        self.until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|until| Instant::now() < until)
    }
}

// ---------------------------------------------------------------------------
// HotkeyWatcher
// ---------------------------------------------------------------------------

/// Turns key events from a [`KeySource`] into signal transitions.
pub struct HotkeyWatcher {
    source: Arc<dyn KeySource>,
    trigger: rdev::Key,
    exit: rdev::Key,
    cooldown: Arc<Cooldown>,
}

impl HotkeyWatcher {
    pub fn new(
        source: Arc<dyn KeySource>,
        trigger: rdev::Key,
        exit: rdev::Key,
        cooldown: Duration,
    ) -> Self {
        Self {
            source,
            trigger,
            exit,
            cooldown: Arc::new(Cooldown {
                period: cooldown,
                until: Mutex::new(None),
            }),
        }
    }

    /// Build from config, falling back to Space / Escape for unknown names.
    pub fn from_config(source: Arc<dyn KeySource>, config: &HotkeyConfig) -> Self {
        let trigger = parse_key(&config.trigger_key).unwrap_or_else(|| {
            log::warn!("unknown trigger key {:?}, using Space", config.trigger_key);
            rdev::Key::Space
        });
        let exit = parse_key(&config.exit_key).unwrap_or_else(|| {
            log::warn!("unknown exit key {:?}, using Escape", config.exit_key);
            rdev::Key::Escape
        });
        Self::new(source, trigger, exit, Duration::from_millis(config.cooldown_ms))
    }

    pub fn in_cooldown(&self) -> bool {
        self.cooldown.active()
    }

    /// See [`KeyGate::wait_for_tap`].  Runs on the calling thread.  A key
    /// source that goes away counts as an exit.
    pub fn wait_for_tap(&self) -> bool {
        let rx = self.source.subscribe();
        let mut pressed = false;

        loop {
            let event = match rx.recv_timeout(LISTENER_POLL) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("key source closed while waiting for the start key");
                    return false;
                }
            };
            match event.transition {
                KeyTransition::Pressed if event.key == self.exit => return false,
                KeyTransition::Pressed if event.key == self.trigger && !pressed => {
                    self.cooldown.start();
                    pressed = true;
                }
                KeyTransition::Released if event.key == self.trigger && pressed => return true,
                _ => {}
            }
        }
    }

    /// See [`KeyGate::arm_stop_on_next_press`].
    ///
    /// The subscription is taken before this returns, so any key event that
    /// happens after the call is seen by the new listener.
    pub fn arm_stop_on_next_press(
        &self,
        stop: &CancellationSignal,
        shutdown: &CancellationSignal,
    ) -> std::io::Result<ListenerHandle> {
        let rx = self.source.subscribe();
        let retired = Arc::new(AtomicBool::new(false));

        let matcher = PhaseMatcher {
            trigger: self.trigger,
            exit: self.exit,
            cooldown: Arc::clone(&self.cooldown),
            stop: stop.clone(),
            shutdown: shutdown.clone(),
        };
        let retired_flag = Arc::clone(&retired);

        let thread = std::thread::Builder::new()
            .name("hotkey-phase".into())
            .spawn(move || loop {
                if retired_flag.load(Ordering::Acquire) {
                    // Honour anything that arrived before retirement.
                    for event in rx.try_iter() {
                        if matcher.handle(event) {
                            break;
                        }
                    }
                    return;
                }
                match rx.recv_timeout(LISTENER_POLL) {
                    Ok(event) => {
                        if matcher.handle(event) {
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            })?;

        Ok(ListenerHandle {
            retired,
            thread: Some(thread),
        })
    }
}

impl KeyGate for HotkeyWatcher {
    fn wait_for_tap(&self) -> bool {
        HotkeyWatcher::wait_for_tap(self)
    }

    fn arm_stop_on_next_press(
        &self,
        stop: &CancellationSignal,
        shutdown: &CancellationSignal,
    ) -> std::io::Result<ListenerHandle> {
        HotkeyWatcher::arm_stop_on_next_press(self, stop, shutdown)
    }
}

/// Per-phase matching state moved into the listener thread.
struct PhaseMatcher {
    trigger: rdev::Key,
    exit: rdev::Key,
    cooldown: Arc<Cooldown>,
    stop: CancellationSignal,
    shutdown: CancellationSignal,
}

impl PhaseMatcher {
    /// Apply one event.  Returns `true` once the listener is done.
    fn handle(&self, event: HotkeyEvent) -> bool {
        if event.transition != KeyTransition::Pressed {
            return false;
        }
        if event.key == self.exit {
            log::debug!("exit key pressed: shutdown requested");
            self.shutdown.set();
            self.stop.set();
            return true;
        }
        if event.key != self.trigger {
            return false;
        }
        if self.cooldown.active() {
            log::debug!("trigger press ignored (cooldown)");
            return false;
        }
        self.stop.set();
        self.cooldown.start();
        true
    }
}

// ---------------------------------------------------------------------------
// ListenerHandle
// ---------------------------------------------------------------------------

/// Handle to a per-phase listener thread.
///
/// Dropping the handle retires the listener; it exits at its next poll tick.
#[derive(Debug)]
pub struct ListenerHandle {
    retired: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// A handle with no thread behind it.  `join` returns `true` at once.
    pub fn idle() -> Self {
        Self {
            retired: Arc::new(AtomicBool::new(true)),
            thread: None,
        }
    }

    /// `true` when the listener thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Retire the listener and wait at most `timeout` for it to exit.
    ///
    /// Events delivered before this call are still applied.  Returns `false`
    /// if the thread outlived the timeout; it is then left to finish on its
    /// own.
    pub fn join(mut self, timeout: Duration) -> bool {
        self.retired.store(true, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                log::debug!("hotkey listener still running after {timeout:?}; detaching");
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        if thread.join().is_err() {
            log::error!("hotkey-phase thread panicked");
        }
        true
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.retired.store(true, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver, Sender};

    use rdev::Key;

    /// Key source driven by the test.
    #[derive(Default)]
    struct ScriptedKeys {
        subscribers: Mutex<Vec<Sender<HotkeyEvent>>>,
    }

    impl ScriptedKeys {
        fn send(&self, event: HotkeyEvent) {
            self.subscribers
                .lock()
                .unwrap()
                .retain(|tx| tx.send(event).is_ok());
        }

        fn press(&self, key: Key) {
            self.send(HotkeyEvent::pressed(key));
        }

        fn release(&self, key: Key) {
            self.send(HotkeyEvent::released(key));
        }

        fn wait_for_subscribers(&self, n: usize) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while self.subscribers.lock().unwrap().len() < n {
                assert!(Instant::now() < deadline, "no subscriber appeared");
                std::thread::sleep(Duration::from_millis(2));
            }
        }

        fn close(&self) {
            self.subscribers.lock().unwrap().clear();
        }
    }

    impl KeySource for ScriptedKeys {
        fn subscribe(&self) -> Receiver<HotkeyEvent> {
            let (tx, rx) = mpsc::channel();
            self.subscribers.lock().unwrap().push(tx);
            rx
        }
    }

    fn watcher(keys: &Arc<ScriptedKeys>, cooldown_ms: u64) -> HotkeyWatcher {
        HotkeyWatcher::new(
            Arc::clone(keys) as Arc<dyn KeySource>,
            Key::Space,
            Key::Escape,
            Duration::from_millis(cooldown_ms),
        )
    }

    fn signals() -> (CancellationSignal, CancellationSignal) {
        (CancellationSignal::new(), CancellationSignal::new())
    }

    // ---- wait_for_tap ------------------------------------------------------

    #[test]
    fn tap_returns_true_after_press_and_release() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 0);

        let driver = {
            let keys = Arc::clone(&keys);
            std::thread::spawn(move || {
                keys.wait_for_subscribers(1);
                keys.release(Key::Space); // release without press is ignored
                keys.press(Key::KeyA);
                keys.press(Key::Space);
                keys.release(Key::Space);
            })
        };

        assert!(w.wait_for_tap());
        driver.join().unwrap();
    }

    #[test]
    fn exit_key_returns_false() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 0);

        let driver = {
            let keys = Arc::clone(&keys);
            std::thread::spawn(move || {
                keys.wait_for_subscribers(1);
                keys.press(Key::Escape);
            })
        };

        assert!(!w.wait_for_tap());
        driver.join().unwrap();
    }

    #[test]
    fn tap_after_several_idle_polls_is_seen() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 0);

        let driver = {
            let keys = Arc::clone(&keys);
            std::thread::spawn(move || {
                keys.wait_for_subscribers(1);
                std::thread::sleep(LISTENER_POLL * 5);
                keys.press(Key::Space);
                std::thread::sleep(LISTENER_POLL * 3);
                keys.release(Key::Space);
            })
        };

        assert!(w.wait_for_tap());
        driver.join().unwrap();
    }

    #[test]
    fn closed_source_counts_as_exit() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 0);

        let driver = {
            let keys = Arc::clone(&keys);
            std::thread::spawn(move || {
                keys.wait_for_subscribers(1);
                keys.close();
            })
        };

        assert!(!w.wait_for_tap());
        driver.join().unwrap();
    }

    #[test]
    fn start_tap_begins_cooldown() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 5_000);

        let driver = {
            let keys = Arc::clone(&keys);
            std::thread::spawn(move || {
                keys.wait_for_subscribers(1);
                keys.press(Key::Space);
                keys.release(Key::Space);
            })
        };

        assert!(w.wait_for_tap());
        driver.join().unwrap();
        assert!(w.in_cooldown());
    }

    // ---- arm_stop_on_next_press --------------------------------------------

    #[test]
    fn trigger_press_sets_stop_only() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 0);
        let (stop, shutdown) = signals();

        let handle = w.arm_stop_on_next_press(&stop, &shutdown).unwrap();
        keys.press(Key::Space);

        assert!(stop.wait_until_set(Duration::from_secs(2)));
        assert!(handle.join(Duration::from_secs(2)));
        assert!(!shutdown.is_set());
    }

    #[test]
    fn exit_press_sets_both_signals() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 0);
        let (stop, shutdown) = signals();

        let handle = w.arm_stop_on_next_press(&stop, &shutdown).unwrap();
        keys.press(Key::Escape);

        assert!(shutdown.wait_until_set(Duration::from_secs(2)));
        assert!(stop.is_set());
        assert!(handle.join(Duration::from_secs(2)));
    }

    #[test]
    fn other_keys_and_releases_are_ignored() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 0);
        let (stop, shutdown) = signals();

        let handle = w.arm_stop_on_next_press(&stop, &shutdown).unwrap();
        keys.press(Key::KeyB);
        keys.release(Key::Space);
        keys.release(Key::Escape);

        assert!(!stop.wait_until_set(Duration::from_millis(100)));
        assert!(handle.join(Duration::from_secs(2)));
        assert!(!stop.is_set());
        assert!(!shutdown.is_set());
    }

    #[test]
    fn presses_within_cooldown_produce_one_transition() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 2_000);
        let shutdown = CancellationSignal::new();

        let first = CancellationSignal::new();
        let h1 = w.arm_stop_on_next_press(&first, &shutdown).unwrap();
        keys.press(Key::Space);
        assert!(first.wait_until_set(Duration::from_secs(2)));
        assert!(h1.join(Duration::from_secs(2)));

        let second = CancellationSignal::new();
        let h2 = w.arm_stop_on_next_press(&second, &shutdown).unwrap();
        keys.press(Key::Space);
        assert!(!second.wait_until_set(Duration::from_millis(150)));

        // The ignored press leaves the listener running until retired.
        assert!(!h2.is_finished());
        assert!(h2.join(Duration::from_secs(2)));
        assert!(!second.is_set());
        assert!(!shutdown.is_set());
    }

    #[test]
    fn presses_beyond_cooldown_produce_two_transitions() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 50);
        let shutdown = CancellationSignal::new();

        let first = CancellationSignal::new();
        let h1 = w.arm_stop_on_next_press(&first, &shutdown).unwrap();
        keys.press(Key::Space);
        assert!(first.wait_until_set(Duration::from_secs(2)));
        assert!(h1.join(Duration::from_secs(2)));

        std::thread::sleep(Duration::from_millis(150));

        let second = CancellationSignal::new();
        let h2 = w.arm_stop_on_next_press(&second, &shutdown).unwrap();
        keys.press(Key::Space);
        assert!(second.wait_until_set(Duration::from_secs(2)));
        assert!(h2.join(Duration::from_secs(2)));
    }

    #[test]
    fn exit_is_honoured_during_cooldown() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 5_000);
        let (stop, shutdown) = signals();
        w.cooldown.start();

        let handle = w.arm_stop_on_next_press(&stop, &shutdown).unwrap();
        keys.press(Key::Space);
        keys.press(Key::Escape);

        assert!(shutdown.wait_until_set(Duration::from_secs(2)));
        assert!(stop.is_set());
        assert!(handle.join(Duration::from_secs(2)));
    }

    #[test]
    fn join_retires_idle_listener_quickly() {
        let keys = Arc::new(ScriptedKeys::default());
        let w = watcher(&keys, 0);
        let (stop, shutdown) = signals();

        let handle = w.arm_stop_on_next_press(&stop, &shutdown).unwrap();
        let start = Instant::now();
        assert!(handle.join(Duration::from_millis(500)));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn idle_handle_joins_immediately() {
        assert!(ListenerHandle::idle().is_finished());
        assert!(ListenerHandle::idle().join(Duration::ZERO));
    }

    #[test]
    fn from_config_falls_back_on_unknown_keys() {
        let keys: Arc<dyn KeySource> = Arc::new(ScriptedKeys::default());
        let config = HotkeyConfig {
            trigger_key: "nope".into(),
            exit_key: "F10".into(),
            ..HotkeyConfig::default()
        };
        let w = HotkeyWatcher::from_config(keys, &config);
        assert_eq!(w.trigger, Key::Space);
        assert_eq!(w.exit, Key::F10);
    }
}
