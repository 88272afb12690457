//! Core `ReplyGenerator` trait and `OpenAiResponder` implementation.
//!
//! `OpenAiResponder` calls the OpenAI `/responses` endpoint.  Each successful
//! call remembers the returned response id and sends it as
//! `previous_response_id` on the next call, so conversational context lives
//! on the provider side and is scoped to this responder instance.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur during reply generation.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key configured.
    #[error("LLM API key is not set")]
    MissingApiKey,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("LLM service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ReplyGenerator trait
// ---------------------------------------------------------------------------

/// Async trait for generating the assistant's reply to one user utterance.
///
/// Implementors must be `Send + Sync` so they can be shared across threads
/// (e.g. wrapped in `Arc<dyn ReplyGenerator>`).  Blank input returns an
/// empty reply without contacting the provider.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn reply(&self, user_text: &str) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    id: String,
    /// Convenience field some gateways include.
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesReply {
    /// `output_text` when present, otherwise every `output_text` part of
    /// every output item, concatenated in order.
    fn text(&self) -> String {
        if let Some(text) = &self.output_text {
            return text.trim().to_string();
        }
        self.output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

fn parse_reply(body: &str) -> Result<(String, String), LlmError> {
    let reply: ResponsesReply =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    let text = reply.text();
    Ok((reply.id, text))
}

// ---------------------------------------------------------------------------
// OpenAiResponder
// ---------------------------------------------------------------------------

/// Calls the OpenAI Responses API.
///
/// # No hardcoded URLs
/// All connection details (`base_url`, `api_key`, `model`) come exclusively
/// from the [`LlmConfig`] passed to [`OpenAiResponder::from_config`].
pub struct OpenAiResponder {
    client: reqwest::Client,
    config: LlmConfig,
    previous_response_id: Mutex<Option<String>>,
}

impl OpenAiResponder {
    /// Build a responder from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            previous_response_id: Mutex::new(None),
        }
    }

    /// Id of the last successful response, if any.
    pub fn previous_response_id(&self) -> Option<String> {
        self.previous_response_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn request_body(&self, user_text: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model":             self.config.model,
            "instructions":      self.config.instructions,
            "max_output_tokens": self.config.max_output_tokens,
            "temperature":       self.config.temperature,
            "input": [
                { "role": "user", "content": user_text }
            ]
        });
        if let Some(previous) = self.previous_response_id() {
            body["previous_response_id"] = serde_json::Value::String(previous);
        }
        body
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiResponder {
    async fn reply(&self, user_text: &str) -> Result<String, LlmError> {
        if user_text.trim().is_empty() {
            return Ok(String::new());
        }

        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let url = format!("{}/responses", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&self.request_body(user_text))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let (id, text) = parse_reply(&body)?;
        *self
            .previous_response_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
