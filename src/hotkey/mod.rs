//! Global hotkeys, backed by `rdev`.
//!
//! # Design
//!
//! `rdev::listen()` is a blocking OS-level call that never returns while the
//! process is alive, and it can only be started once.  [`RdevKeySource`]
//! therefore runs it on a single dedicated OS thread and fans every key event
//! out to any number of subscribers.
//!
//! [`HotkeyWatcher`] sits on top of a [`KeySource`] and turns key patterns
//! into [`CancellationSignal`](crate::signal::CancellationSignal)
//! transitions:
//!
//! - [`HotkeyWatcher::wait_for_tap`] blocks until the trigger key is tapped
//!   (`true`) or the exit key is pressed (`false`).
//! - [`HotkeyWatcher::arm_stop_on_next_press`] spawns a per-phase listener
//!   that sets a stop signal on the next trigger press (outside the cooldown
//!   window) and stop + shutdown on the exit key.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use turn_voice::hotkey::{parse_key, HotkeyWatcher, RdevKeySource};
//! use turn_voice::signal::CancellationSignal;
//!
//! let watcher = HotkeyWatcher::new(
//!     Arc::new(RdevKeySource),
//!     parse_key("Space").unwrap(),
//!     parse_key("Escape").unwrap(),
//!     Duration::from_millis(800),
//! );
//! if watcher.wait_for_tap() {
//!     let (stop, shutdown) = (CancellationSignal::new(), CancellationSignal::new());
//!     let handle = watcher.arm_stop_on_next_press(&stop, &shutdown).unwrap();
//!     stop.wait_until_set(Duration::from_secs(30));
//!     handle.join(Duration::from_millis(500));
//! }
//! ```

pub mod listener;
pub mod watcher;

pub use listener::{KeySource, RdevKeySource};
pub use watcher::{HotkeyWatcher, KeyGate, ListenerHandle};

// ---------------------------------------------------------------------------
// HotkeyEvent
// ---------------------------------------------------------------------------

/// Direction of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Pressed,
    Released,
}

/// A single key event as delivered by a [`KeySource`].  Consumed immediately
/// by the watcher's matching logic; never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotkeyEvent {
    pub key: rdev::Key,
    pub transition: KeyTransition,
}

impl HotkeyEvent {
    pub fn pressed(key: rdev::Key) -> Self {
        Self {
            key,
            transition: KeyTransition::Pressed,
        }
    }

    pub fn released(key: rdev::Key) -> Self {
        Self {
            key,
            transition: KeyTransition::Released,
        }
    }

    /// Translate an `rdev` event; mouse and wheel events yield `None`.
    pub fn from_rdev(event: &rdev::EventType) -> Option<Self> {
        match event {
            rdev::EventType::KeyPress(key) => Some(Self::pressed(*key)),
            rdev::EventType::KeyRelease(key) => Some(Self::released(*key)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

const LETTERS: [rdev::Key; 26] = [
    rdev::Key::KeyA,
    rdev::Key::KeyB,
    rdev::Key::KeyC,
    rdev::Key::KeyD,
    rdev::Key::KeyE,
    rdev::Key::KeyF,
    rdev::Key::KeyG,
    rdev::Key::KeyH,
    rdev::Key::KeyI,
    rdev::Key::KeyJ,
    rdev::Key::KeyK,
    rdev::Key::KeyL,
    rdev::Key::KeyM,
    rdev::Key::KeyN,
    rdev::Key::KeyO,
    rdev::Key::KeyP,
    rdev::Key::KeyQ,
    rdev::Key::KeyR,
    rdev::Key::KeyS,
    rdev::Key::KeyT,
    rdev::Key::KeyU,
    rdev::Key::KeyV,
    rdev::Key::KeyW,
    rdev::Key::KeyX,
    rdev::Key::KeyY,
    rdev::Key::KeyZ,
];

const FUNCTION_KEYS: [rdev::Key; 12] = [
    rdev::Key::F1,
    rdev::Key::F2,
    rdev::Key::F3,
    rdev::Key::F4,
    rdev::Key::F5,
    rdev::Key::F6,
    rdev::Key::F7,
    rdev::Key::F8,
    rdev::Key::F9,
    rdev::Key::F10,
    rdev::Key::F11,
    rdev::Key::F12,
];

/// Parse a key name from the config file into an [`rdev::Key`].
///
/// Accepts named keys (case-insensitive), `F1`–`F12` and single ASCII
/// letters.  Returns `None` for anything else so the caller can report the
/// bad setting.
///
/// ```
/// use turn_voice::hotkey::parse_key;
///
/// assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
/// assert_eq!(parse_key("esc"), Some(rdev::Key::Escape));
/// assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
/// assert_eq!(parse_key("q"), Some(rdev::Key::KeyQ));
/// assert_eq!(parse_key("Ctrl+V"), None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    let name = name.trim();

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c
            .is_ascii_alphabetic()
            .then(|| LETTERS[(c.to_ascii_lowercase() as u8 - b'a') as usize]);
    }

    let lower = name.to_ascii_lowercase();
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        return (1..=12).contains(&n).then(|| FUNCTION_KEYS[n - 1]);
    }

    let key = match lower.as_str() {
        "space" => rdev::Key::Space,
        "escape" | "esc" => rdev::Key::Escape,
        "return" | "enter" => rdev::Key::Return,
        "tab" => rdev::Key::Tab,
        "backspace" => rdev::Key::Backspace,
        "delete" | "del" => rdev::Key::Delete,
        "insert" => rdev::Key::Insert,
        "home" => rdev::Key::Home,
        "end" => rdev::Key::End,
        "pageup" => rdev::Key::PageUp,
        "pagedown" => rdev::Key::PageDown,
        "up" | "uparrow" => rdev::Key::UpArrow,
        "down" | "downarrow" => rdev::Key::DownArrow,
        "left" | "leftarrow" => rdev::Key::LeftArrow,
        "right" | "rightarrow" => rdev::Key::RightArrow,
        "capslock" => rdev::Key::CapsLock,
        "pause" => rdev::Key::Pause,
        "printscreen" => rdev::Key::PrintScreen,
        "scrolllock" => rdev::Key::ScrollLock,
        "shift" | "shiftleft" => rdev::Key::ShiftLeft,
        "shiftright" => rdev::Key::ShiftRight,
        "ctrl" | "control" | "controlleft" => rdev::Key::ControlLeft,
        "controlright" => rdev::Key::ControlRight,
        "alt" => rdev::Key::Alt,
        "altgr" => rdev::Key::AltGr,
        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_function_keys() {
        assert_eq!(parse_key("F1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("f12"), Some(rdev::Key::F12));
        assert_eq!(parse_key("F13"), None);
        assert_eq!(parse_key("F0"), None);
    }

    #[test]
    fn parse_named_keys_case_insensitive() {
        assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
        assert_eq!(parse_key("SPACE"), Some(rdev::Key::Space));
        assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Esc"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Enter"), Some(rdev::Key::Return));
        assert_eq!(parse_key(" ctrl "), Some(rdev::Key::ControlLeft));
    }

    #[test]
    fn parse_letters() {
        assert_eq!(parse_key("A"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("z"), Some(rdev::Key::KeyZ));
        assert_eq!(parse_key("1"), None);
    }

    #[test]
    fn parse_unknown_returns_none() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key("Ctrl+V"), None);
        assert_eq!(parse_key("Fx"), None);
    }

    #[test]
    fn rdev_events_translate() {
        let press = HotkeyEvent::from_rdev(&rdev::EventType::KeyPress(rdev::Key::Space));
        assert_eq!(press, Some(HotkeyEvent::pressed(rdev::Key::Space)));

        let release = HotkeyEvent::from_rdev(&rdev::EventType::KeyRelease(rdev::Key::Escape));
        assert_eq!(release, Some(HotkeyEvent::released(rdev::Key::Escape)));

        let wheel = rdev::EventType::Wheel {
            delta_x: 0,
            delta_y: 1,
        };
        assert_eq!(HotkeyEvent::from_rdev(&wheel), None);
    }
}
