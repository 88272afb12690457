//! ElevenLabs text-to-speech.
//!
//! `POST {base_url}/text-to-speech/{voice_id}?output_format=pcm_{rate}` with
//! an `xi-api-key` header.  The response body is raw PCM.

use async_trait::async_trait;

use crate::config::TtsConfig;

use super::{Synthesizer, TtsError};

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    config: TtsConfig,
}

impl ElevenLabsSynthesizer {
    /// Build a synthesizer from application config.  Missing credentials
    /// are reported on the first `synthesize` call.
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn output_format(&self) -> String {
        format!("pcm_{}", self.config.sample_rate)
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "text":           text,
            "model_id":       self.config.model,
            "voice_settings": self.config.voice,
        })
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(TtsError::MissingSetting("API key"))?;
        let voice_id = self
            .config
            .voice_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(TtsError::MissingSetting("voice id"))?;

        let url = format!(
            "{}/text-to-speech/{voice_id}",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .query(&[("output_format", self.output_format())])
            .header("xi-api-key", key)
            .json(&self.request_body(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let pcm = response.bytes().await?.to_vec();
        if pcm.len() % 2 != 0 {
            return Err(TtsError::MalformedAudio(pcm.len()));
        }
        log::debug!("tts: received {} bytes of PCM", pcm.len());
        Ok(pcm)
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
