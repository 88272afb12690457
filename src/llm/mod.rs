//! Reply generation.
//!
//! This module provides:
//! * [`ReplyGenerator`] — async trait the orchestrator calls once per turn.
//! * [`OpenAiResponder`] — OpenAI Responses API backend that chains calls
//!   through `previous_response_id`, so the provider keeps the conversation.
//! * [`LlmError`] — error variants for reply generation.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use turn_voice::config::AppConfig;
//! use turn_voice::llm::{OpenAiResponder, ReplyGenerator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut config = AppConfig::default();
//!     config.apply_env_overrides();
//!
//!     let llm = OpenAiResponder::from_config(&config.llm);
//!     let first = llm.reply("Hi, who am I talking to?").await.unwrap();
//!     let second = llm.reply("What did I just ask?").await.unwrap();
//!     println!("{first}\n{second}");
//! }
//! ```

pub mod responder;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use responder::{LlmError, OpenAiResponder, ReplyGenerator};
