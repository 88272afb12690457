//! [`DeepgramTranscriber`]: Deepgram pre-recorded transcription over HTTP.
//!
//! The WAV is sent as the raw request body to `{base_url}/listen` with a
//! `Token` authorization header.  All connection details come from
//! [`SttConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use serde::Deserialize;

use crate::audio::WavContainer;
use crate::config::SttConfig;

use super::{SttError, Transcriber};

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ListenResponse {
    #[serde(default)]
    results: ListenResults,
}

#[derive(Debug, Default, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

/// Pull `results.channels[0].alternatives[0].transcript` out of a response
/// body.  A response without channels or alternatives means nothing was
/// recognised.
fn parse_transcript(body: &str) -> Result<String, SttError> {
    let response: ListenResponse =
        serde_json::from_str(body).map_err(|e| SttError::Parse(e.to_string()))?;

    Ok(response
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|channel| channel.alternatives.into_iter().next())
        .map(|alt| alt.transcript.trim().to_string())
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// DeepgramTranscriber
// ---------------------------------------------------------------------------

pub struct DeepgramTranscriber {
    client: reqwest::Client,
    config: SttConfig,
}

impl DeepgramTranscriber {
    /// Build a transcriber from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.  A missing API key is reported on the first
    /// `transcribe` call.
    pub fn from_config(config: &SttConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/listen", self.config.base_url.trim_end_matches('/'))
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("model", self.config.model.clone()),
            ("language", self.config.language.clone()),
        ];
        if self.config.smart_format {
            query.push(("smart_format", "true".into()));
        }
        if self.config.punctuate {
            query.push(("punctuate", "true".into()));
        }
        query
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, wav: &WavContainer) -> Result<String, SttError> {
        if !wav.has_samples() {
            return Ok(String::new());
        }

        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(SttError::MissingApiKey)?;

        log::debug!("stt: sending {} bytes to {}", wav.len(), self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .query(&self.query())
            .header(reqwest::header::AUTHORIZATION, format!("Token {key}"))
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(wav.as_bytes().to_vec())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SttError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_transcript(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
