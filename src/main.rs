//! Application entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk and overlay environment variables.
//! 3. Refuse to start when a required credential is missing.
//! 4. Build the tokio runtime.
//! 5. Resolve audio devices, open the session's turn log and build the
//!    providers selected by `session.mode`.
//! 6. Run the [`TurnOrchestrator`] on a tokio runtime until the exit key.

use std::sync::Arc;

use anyhow::Context;
use turn_voice::{
    audio::AudioEngine,
    config::{AppConfig, SessionMode},
    history::JsonlTurnLog,
    hotkey::{HotkeyWatcher, RdevKeySource},
    llm::OpenAiResponder,
    pipeline::{EndReason, OrchestratorSettings, TurnOrchestrator},
    stt::DeepgramTranscriber,
    tts::ElevenLabsSynthesizer,
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("turn-voice starting up");

    // 2. Configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.apply_env_overrides();

    // 3. Credentials
    config.validate()?;

    // 4. Tokio runtime (2 worker threads; blocking audio/key work goes to the
    //    blocking pool)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 5. Collaborators
    let audio = Arc::new(AudioEngine::new(&config.audio));
    let keys = Arc::new(HotkeyWatcher::from_config(
        Arc::new(RdevKeySource),
        &config.hotkey,
    ));
    let log_dir = config.log_dir();
    let turn_log = JsonlTurnLog::create(&log_dir)
        .with_context(|| format!("cannot open turn log in {}", log_dir.display()))?;

    let mut orchestrator = TurnOrchestrator::new(
        audio,
        keys,
        Arc::new(DeepgramTranscriber::from_config(&config.stt)),
        Arc::new(turn_log),
        OrchestratorSettings::from_config(&config),
    );
    if config.session.mode == SessionMode::Conversation {
        orchestrator = orchestrator.with_replies(
            Arc::new(OpenAiResponder::from_config(&config.llm)),
            Arc::new(ElevenLabsSynthesizer::from_config(&config.tts)),
        );
    }

    // 6. Run
    let summary = rt.block_on(orchestrator.run());

    match summary.end_reason {
        EndReason::Fatal(msg) => anyhow::bail!(msg),
        _ => Ok(()),
    }
}
