//! [`TurnOrchestrator`]: drives one conversation session.
//!
//! # Turn flow
//!
//! ```text
//! Recording     arm(stop, shutdown) → record_until(stop) → join listener
//!                 └─ shutdown set → ShuttingDown
//!               arm(stop, shutdown) for everything below
//! Transcribing  transcribe(wav)      ─ error / blank → discard, record again
//! Generating    reply(user_text)     ─ error / blank → discard, record again
//! Synthesizing  synthesize(reply) → pcm16_to_wav ─ error → discard
//! Playing       play_wav(stop), skipped if stop is already set
//!               join listener
//! ```
//!
//! `shutdown` is checked after each provider call and after playback; once
//! set, the turn is dropped and no further phase starts.
//!
//! Blocking work (key waits, capture, playback, listener joins) runs on
//! `tokio::task::spawn_blocking` so the runtime thread never stalls.

use std::sync::Arc;
use std::time::Duration;

use crate::audio::{pcm16_to_wav, AudioError, AudioIo, WavContainer};
use crate::config::{AppConfig, SessionMode};
use crate::history::{Turn, TurnLogger};
use crate::hotkey::{KeyGate, ListenerHandle};
use crate::llm::ReplyGenerator;
use crate::signal::CancellationSignal;
use crate::stt::Transcriber;
use crate::tts::Synthesizer;

use super::state::{EndReason, SessionSummary, TurnState};

// ---------------------------------------------------------------------------
// OrchestratorSettings
// ---------------------------------------------------------------------------

/// Knobs the orchestrator reads from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Capture channel count.
    pub channels: u16,
    /// Upper bound on one recording; `None` records until stopped.
    pub record_timeout: Option<Duration>,
    /// Bounded wait for a phase listener after the phase ends.
    pub join_timeout: Duration,
    /// Key names shown in the console prompts.
    pub trigger_label: String,
    pub exit_label: String,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            channels: config.audio.channels.max(1),
            record_timeout: (config.audio.record_timeout_secs > 0)
                .then(|| Duration::from_secs(config.audio.record_timeout_secs)),
            join_timeout: Duration::from_millis(config.hotkey.join_timeout_ms),
            trigger_label: config.hotkey.trigger_key.to_uppercase(),
            exit_label: config.hotkey.exit_key.to_uppercase(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Turn outcome
// ---------------------------------------------------------------------------

/// How a single pass through the turn phases ended.
#[derive(Debug)]
enum TurnOutcome {
    Completed,
    Discarded,
    Shutdown,
    Fatal(String),
}

struct Replies {
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Arc<dyn Synthesizer>,
}

// ---------------------------------------------------------------------------
// TurnOrchestrator
// ---------------------------------------------------------------------------

/// Owns the collaborators for one session and runs the turn loop.
///
/// Built with only a transcriber, the orchestrator runs in
/// [`SessionMode::TranscribeOnly`]: each non-blank transcript is logged as a
/// turn with an empty assistant text.  [`with_replies`](Self::with_replies)
/// adds the generate/synthesize/play phases.
pub struct TurnOrchestrator {
    audio: Arc<dyn AudioIo>,
    keys: Arc<dyn KeyGate>,
    transcriber: Arc<dyn Transcriber>,
    replies: Option<Replies>,
    logger: Arc<dyn TurnLogger>,
    settings: OrchestratorSettings,
    state: TurnState,
    next_turn_id: u64,
    discarded: u64,
}

impl TurnOrchestrator {
    pub fn new(
        audio: Arc<dyn AudioIo>,
        keys: Arc<dyn KeyGate>,
        transcriber: Arc<dyn Transcriber>,
        logger: Arc<dyn TurnLogger>,
        settings: OrchestratorSettings,
    ) -> Self {
        let mut orchestrator = Self {
            audio,
            keys,
            transcriber,
            replies: None,
            logger,
            settings,
            state: TurnState::Idle,
            next_turn_id: 1,
            discarded: 0,
        };
        orchestrator.set_state(TurnState::AwaitingStart);
        orchestrator
    }

    /// Enable the generate → synthesize → play phases.
    pub fn with_replies(
        mut self,
        generator: Arc<dyn ReplyGenerator>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        self.replies = Some(Replies {
            generator,
            synthesizer,
        });
        self
    }

    pub fn mode(&self) -> SessionMode {
        if self.replies.is_some() {
            SessionMode::Conversation
        } else {
            SessionMode::TranscribeOnly
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the session to completion.
    ///
    /// Returns once the exit key is pressed or a device failure makes
    /// further turns impossible.  Calling `run` again on a terminated
    /// orchestrator returns immediately.
    pub async fn run(&mut self) -> SessionSummary {
        if self.state == TurnState::Terminated {
            return self.summary(EndReason::ExitRequested);
        }

        println!(
            "Press {} to start ({} to exit).",
            self.settings.trigger_label, self.settings.exit_label
        );
        let keys = Arc::clone(&self.keys);
        let started = match tokio::task::spawn_blocking(move || keys.wait_for_tap()).await {
            Ok(started) => started,
            Err(e) => {
                log::error!("pipeline: start-key task failed: {e}");
                false
            }
        };
        if !started {
            println!("Early exit.");
            self.set_state(TurnState::Terminated);
            return self.summary(EndReason::ExitBeforeStart);
        }

        log::info!("pipeline: session started ({:?} mode)", self.mode());

        let reason = loop {
            match self.run_turn().await {
                TurnOutcome::Completed => {}
                TurnOutcome::Discarded => self.discarded += 1,
                TurnOutcome::Shutdown => break EndReason::ExitRequested,
                TurnOutcome::Fatal(msg) => {
                    log::error!("pipeline: {msg}");
                    break EndReason::Fatal(msg);
                }
            }
        };

        self.set_state(TurnState::ShuttingDown);
        println!("\nGraceful shutdown.");
        self.set_state(TurnState::Terminated);

        let summary = self.summary(reason);
        log::info!(
            "pipeline: session ended ({}): {} turns, {} discarded",
            summary.end_reason,
            summary.turns_completed,
            summary.turns_discarded
        );
        summary
    }

    // -----------------------------------------------------------------------
    // One turn
    // -----------------------------------------------------------------------

    async fn run_turn(&mut self) -> TurnOutcome {
        let turn_id = self.next_turn_id;
        let wav = match self.record(turn_id).await {
            Ok(wav) => wav,
            Err(outcome) => return outcome,
        };

        // One pair spans the provider calls and playback.  A trigger press
        // before playback skips the reply; the exit key ends the session.
        let (stop, shutdown) = (CancellationSignal::new(), CancellationSignal::new());
        let listener = match self.keys.arm_stop_on_next_press(&stop, &shutdown) {
            Ok(handle) => handle,
            Err(e) => return TurnOutcome::Fatal(format!("cannot start key listener: {e}")),
        };
        let outcome = self.respond(turn_id, wav, &stop, &shutdown).await;
        self.retire(listener).await;

        match outcome {
            TurnOutcome::Completed | TurnOutcome::Fatal(_) => outcome,
            _ if shutdown.is_set() => TurnOutcome::Shutdown,
            other => other,
        }
    }

    /// Capture one utterance with its own stop/shutdown pair.
    async fn record(&mut self, turn_id: u64) -> Result<WavContainer, TurnOutcome> {
        self.set_state(TurnState::Recording);
        println!(
            "\n[{turn_id}] Recording… ({} to stop, {} to exit)",
            self.settings.trigger_label, self.settings.exit_label
        );

        let (stop, shutdown) = (CancellationSignal::new(), CancellationSignal::new());
        let listener = self
            .keys
            .arm_stop_on_next_press(&stop, &shutdown)
            .map_err(|e| TurnOutcome::Fatal(format!("cannot start key listener: {e}")))?;

        let audio = Arc::clone(&self.audio);
        let (channels, timeout) = (self.settings.channels, self.settings.record_timeout);
        let recorded =
            tokio::task::spawn_blocking(move || audio.record_until(&stop, channels, timeout))
                .await;
        self.retire(listener).await;

        if shutdown.is_set() {
            return Err(TurnOutcome::Shutdown);
        }
        match recorded {
            Ok(Ok(wav)) => Ok(wav),
            Ok(Err(e)) => Err(audio_failure("recording", e)),
            Err(e) => Err(TurnOutcome::Fatal(format!("recording task failed: {e}"))),
        }
    }

    /// Transcribe, generate, synthesize and play.  `shutdown` is checked
    /// after every provider call so no new phase starts once exit is pressed.
    async fn respond(
        &mut self,
        turn_id: u64,
        wav: WavContainer,
        stop: &CancellationSignal,
        shutdown: &CancellationSignal,
    ) -> TurnOutcome {
        // ── Transcribing ─────────────────────────────────────────────────
        self.set_state(TurnState::Transcribing);
        let transcript = self.transcriber.transcribe(&wav).await;
        if shutdown.is_set() {
            return TurnOutcome::Shutdown;
        }
        let user_text = match transcript {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                log::warn!("pipeline: transcription failed: {e}");
                println!("[STT error] {e}");
                return TurnOutcome::Discarded;
            }
        };
        println!("[user] {user_text:?}");
        if user_text.is_empty() {
            log::debug!("pipeline: blank transcript, discarding attempt");
            return TurnOutcome::Discarded;
        }

        let Some((generator, synthesizer)) = self
            .replies
            .as_ref()
            .map(|r| (Arc::clone(&r.generator), Arc::clone(&r.synthesizer)))
        else {
            self.log_turn(Turn::now(turn_id, user_text, String::new()));
            return TurnOutcome::Completed;
        };

        // ── Generating ───────────────────────────────────────────────────
        self.set_state(TurnState::Generating);
        let generated = generator.reply(&user_text).await;
        if shutdown.is_set() {
            return TurnOutcome::Shutdown;
        }
        let reply = match generated {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                log::warn!("pipeline: reply generation failed: {e}");
                println!("[LLM error] {e}");
                return TurnOutcome::Discarded;
            }
        };
        println!("[assistant] {reply:?}");
        if reply.is_empty() {
            log::debug!("pipeline: blank reply, discarding attempt");
            return TurnOutcome::Discarded;
        }

        // ── Synthesizing ─────────────────────────────────────────────────
        self.set_state(TurnState::Synthesizing);
        let synthesized = synthesizer.synthesize(&reply).await;
        if shutdown.is_set() {
            return TurnOutcome::Shutdown;
        }
        let speech = match synthesized {
            Ok(pcm) => pcm16_to_wav(&pcm, synthesizer.sample_rate(), 1),
            Err(e) => {
                log::warn!("pipeline: speech synthesis failed: {e}");
                println!("[TTS error] {e}");
                return TurnOutcome::Discarded;
            }
        };
        let speech = match speech {
            Ok(wav) => wav,
            Err(e) => {
                log::warn!("pipeline: synthesized audio unusable: {e}");
                return TurnOutcome::Discarded;
            }
        };

        // ── Playing ──────────────────────────────────────────────────────
        self.set_state(TurnState::Playing);
        let played = if stop.is_set() {
            log::debug!("pipeline: reply skipped before playback");
            Ok(Ok(()))
        } else {
            println!(
                "Speaking… ({} to skip, {} to exit)",
                self.settings.trigger_label, self.settings.exit_label
            );
            let audio = Arc::clone(&self.audio);
            let cancel = stop.clone();
            tokio::task::spawn_blocking(move || audio.play_wav(&speech, Some(&cancel), true))
                .await
        };
        if shutdown.is_set() {
            return TurnOutcome::Shutdown;
        }
        match played {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return audio_failure("playback", e),
            Err(e) => return TurnOutcome::Fatal(format!("playback task failed: {e}")),
        }

        self.log_turn(Turn::now(turn_id, user_text, reply));
        TurnOutcome::Completed
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Join a phase listener with the configured bounded wait.
    async fn retire(&self, listener: ListenerHandle) {
        let timeout = self.settings.join_timeout;
        let joined = tokio::task::spawn_blocking(move || listener.join(timeout)).await;
        if !matches!(joined, Ok(true)) {
            log::debug!("pipeline: key listener did not exit within {timeout:?}");
        }
    }

    /// Hand a finished turn to the logger and advance the turn counter.  A
    /// logger failure is reported but the turn still counts.
    fn log_turn(&mut self, turn: Turn) {
        if let Err(e) = self.logger.record(&turn) {
            log::warn!("pipeline: failed to record turn {}: {e}", turn.turn_id);
        }
        self.next_turn_id += 1;
    }

    fn set_state(&mut self, state: TurnState) {
        log::debug!("pipeline: {} → {}", self.state, state);
        self.state = state;
    }

    fn summary(&self, end_reason: EndReason) -> SessionSummary {
        SessionSummary {
            turns_completed: self.next_turn_id - 1,
            turns_discarded: self.discarded,
            end_reason,
        }
    }
}

/// Device failures end the session; anything else discards the attempt.
fn audio_failure(phase: &str, e: AudioError) -> TurnOutcome {
    if e.is_device_error() {
        TurnOutcome::Fatal(format!("{phase} failed: {e}"))
    } else {
        log::warn!("pipeline: {phase} failed: {e}");
        TurnOutcome::Discarded
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
