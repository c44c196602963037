//! OpenAI-compatible speech: JSON POST to `{base_url}/audio/speech`.

use async_trait::async_trait;

use crate::config::TtsConfig;
use crate::http_util::{api_error_message, join_url};
use crate::tts::engine::{SynthesizedAudio, Synthesizer, TtsError};

/// MIME type for an `/audio/speech` `response_format`.
pub fn media_type_for_format(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "wav" => "audio/wav",
        "opus" => "audio/ogg",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "pcm" => "audio/pcm",
        _ => "audio/mpeg",
    }
}

pub struct OpenAiSpeechSynthesizer {
    client: reqwest::Client,
    config: TtsConfig,
}

impl OpenAiSpeechSynthesizer {
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

    pub fn endpoint(&self) -> String {
        join_url(&self.config.base_url, "audio/speech")
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model":           self.config.model,
            "input":           text,
            "voice":           self.config.voice,
            "response_format": self.config.response_format
        })
    }
}

#[async_trait]
impl Synthesizer for OpenAiSpeechSynthesizer {
    /// The voice decides the spoken language, so `language` is unused.
    async fn synthesize(&self, text: &str, _language: &str) -> Result<SynthesizedAudio, TtsError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TtsError::EmptyText);
        }

        let mut req = self.client.post(self.endpoint()).json(&self.request_body(text));
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        Ok(SynthesizedAudio::new(
            bytes,
            media_type_for_format(&self.config.response_format),
        ))
    }
}
