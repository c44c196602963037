//! Whisper over HTTP: multipart POST to `{base_url}/audio/transcriptions`.
//!
//! Works with Groq (the default), OpenAI and self-hosted servers that speak
//! the OpenAI transcription wire format.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::audio::AudioClip;
use crate::config::SttConfig;
use crate::http_util::{api_error_message, join_url};
use crate::stt::engine::{SttError, Transcriber};

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Calls an OpenAI-compatible transcription endpoint.
///
/// All connection details come from [`SttConfig`].
pub struct WhisperApiTranscriber {
    client: reqwest::Client,
    config: SttConfig,
}

impl WhisperApiTranscriber {
    /// The HTTP client carries `config.timeout_secs` as its request timeout.
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

    pub fn endpoint(&self) -> String {
        join_url(&self.config.base_url, "audio/transcriptions")
    }

    fn build_form(&self, clip: &AudioClip, language: &str) -> Result<Form, SttError> {
        let file = Part::bytes(clip.bytes().to_vec())
            .file_name(clip.filename().to_string())
            .mime_str(clip.content_type())
            .map_err(|e| SttError::Request(format!("invalid content type: {e}")))?;

        let mut form = Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .part("file", file);

        if !language.is_empty() && language != "auto" {
            form = form.text("language", language.to_string());
        }
        Ok(form)
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    async fn transcribe(&self, clip: &AudioClip, language: &str) -> Result<String, SttError> {
        let form = self.build_form(clip, language)?;
        let mut req = self.client.post(self.endpoint()).multipart(form);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SttError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| SttError::Parse(e.to_string()))?;

        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(SttError::EmptyTranscript);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::UploadValidator;

    fn make_config(base_url: &str) -> SttConfig {
        SttConfig {
            base_url: base_url.into(),
            api_key: None,
            model: "whisper-large-v3".into(),
            language: "ar".into(),
            timeout_secs: 2,
        }
    }

    #[test]
    fn endpoint_appends_path() {
        let stt = WhisperApiTranscriber::from_config(&make_config("https://api.groq.com/openai/v1/"));
        assert_eq!(
            stt.endpoint(),
            "https://api.groq.com/openai/v1/audio/transcriptions"
        );
    }

    #[test]
    fn form_builds_for_sniffed_clip() {
        let stt = WhisperApiTranscriber::from_config(&make_config("http://localhost:1"));
        let clip = UploadValidator::default()
            .validate(b"fLaC\0\0\0\x22".to_vec(), None, None)
            .unwrap();
        assert!(stt.build_form(&clip, "auto").is_ok());
        assert!(stt.build_form(&clip, "ar").is_ok());
    }

    #[tokio::test]
    async fn unreachable_service_is_request_error() {
        let stt = WhisperApiTranscriber::from_config(&make_config("http://127.0.0.1:9/v1"));
        let clip = UploadValidator::default()
            .validate(b"OggS\0\x02".to_vec(), None, None)
            .unwrap();
        let err = stt.transcribe(&clip, "ar").await.unwrap_err();
        assert!(matches!(err, SttError::Request(_) | SttError::Timeout));
    }

    #[test]
    fn transcriber_is_object_safe() {
        let stt: Box<dyn Transcriber> =
            Box::new(WhisperApiTranscriber::from_config(&make_config("http://x")));
        drop(stt);
    }
}
