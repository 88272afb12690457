//! Turn state machine and the session outcome.
//!
//! [`TurnState`] is the orchestrator's current phase.  [`SessionSummary`] is
//! what [`TurnOrchestrator::run`](super::TurnOrchestrator::run) hands back
//! once the session is over.

use std::fmt;

// ---------------------------------------------------------------------------
// TurnState
// ---------------------------------------------------------------------------

/// States of the turn orchestrator.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──construct──▶ AwaitingStart ──tap──▶ Recording
///                                   ──exit─▶ Terminated
///
/// Recording ─▶ Transcribing ─▶ Generating ─▶ Synthesizing ─▶ Playing ─┐
///     ▲            │ fail/blank    │ fail/blank    │ fail              │
///     └────────────┴───────────────┴───────────────┴───────────────────┘
///
/// any turn phase ──exit key──▶ ShuttingDown ─▶ Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,

    /// Blocked until the user taps the trigger key.
    AwaitingStart,

    /// Microphone open; a stop listener is armed.
    Recording,

    Transcribing,

    Generating,

    Synthesizing,

    /// Reply audio playing; a stop listener is armed.
    Playing,

    /// Leaving the loop; listener handles are being retired.
    ShuttingDown,

    /// Terminal.  No further transitions.
    Terminated,
}

impl TurnState {
    /// Returns `true` for the phases that make up a turn.
    ///
    /// ```
    /// use turn_voice::pipeline::TurnState;
    ///
    /// assert!(!TurnState::AwaitingStart.is_busy());
    /// assert!(TurnState::Recording.is_busy());
    /// assert!(TurnState::Playing.is_busy());
    /// assert!(!TurnState::Terminated.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            TurnState::Recording
                | TurnState::Transcribing
                | TurnState::Generating
                | TurnState::Synthesizing
                | TurnState::Playing
        )
    }

    /// A short human-readable label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            TurnState::Idle => "Idle",
            TurnState::AwaitingStart => "Awaiting start",
            TurnState::Recording => "Recording",
            TurnState::Transcribing => "Transcribing",
            TurnState::Generating => "Generating",
            TurnState::Synthesizing => "Synthesizing",
            TurnState::Playing => "Playing",
            TurnState::ShuttingDown => "Shutting down",
            TurnState::Terminated => "Terminated",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// SessionSummary
// ---------------------------------------------------------------------------

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The exit key was pressed before the first turn started.
    ExitBeforeStart,
    /// The exit key was pressed during a turn.
    ExitRequested,
    /// An unrecoverable condition, e.g. no audio device.
    Fatal(String),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::ExitBeforeStart => write!(f, "exit before start"),
            EndReason::ExitRequested => write!(f, "exit requested"),
            EndReason::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

/// Outcome of one [`run`](super::TurnOrchestrator::run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Turns handed to the turn logger.
    pub turns_completed: u64,
    /// Attempts dropped after a provider failure or a blank result.
    pub turns_discarded: u64,
    pub end_reason: EndReason,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
