//! Core `Completer` trait and `ApiCompleter` implementation.
//!
//! `ApiCompleter` calls any OpenAI-compatible `{base_url}/chat/completions`
//! endpoint (Groq, OpenAI, Ollama in OpenAI mode, LM Studio, vLLM, …).
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::http_util::{api_error_message, join_url};
use crate::llm::prompt::PromptBuilder;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while asking the language model for a reply.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("LLM service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,
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
// Completer trait
// ---------------------------------------------------------------------------

/// Turns the user's transcribed words into the assistant's reply.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn Completer>`).  A successful reply is trimmed
/// and non-empty.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiCompleter
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible chat-completions endpoint.
pub struct ApiCompleter {
    client: reqwest::Client,
    config: LlmConfig,
    prompt_builder: PromptBuilder,
}

impl ApiCompleter {
    /// The HTTP client is pre-configured with `config.timeout_secs`.  A
    /// default client is used if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let prompt_builder = match &config.system_prompt {
            Some(custom) if !custom.trim().is_empty() => PromptBuilder::with_system_prompt(custom),
            _ => PromptBuilder::new(&config.language),
        };

        Self {
            client,
            config: config.clone(),
            prompt_builder,
        }
    }

    pub fn endpoint(&self) -> String {
        join_url(&self.config.base_url, "chat/completions")
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let (system_msg, user_msg) = self.prompt_builder.build_chat(prompt);
        serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        })
    }
}

/// Pull the first choice's text out of a chat-completions response.
fn extract_reply(json: &serde_json::Value) -> Result<String, LlmError> {
    let reply = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(LlmError::EmptyResponse)?
        .trim()
        .to_string();

    if reply.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(reply)
}

#[async_trait]
impl Completer for ApiCompleter {
    /// The `Authorization: Bearer …` header is attached only when
    /// `config.api_key` is a non-empty string.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut req = self.client.post(self.endpoint()).json(&self.request_body(prompt));

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        extract_reply(&json)
    }
}

// ---------------------------------------------------------------------------
// MockCompleter (test only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockCompleter;

#[cfg(test)]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Returns a fixed reply or error, optionally after a delay.
    pub struct MockCompleter {
        response: Result<String, LlmError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MockCompleter {
        pub fn ok(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn err(error: LlmError) -> Self {
            Self {
                response: Err(error),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Completer for MockCompleter {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            base_url: "http://localhost:11434/v1".into(),
            api_key: api_key.map(|s| s.to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn from_config_accepts_missing_and_empty_keys() {
        let _ = ApiCompleter::from_config(&make_config(None));
        let _ = ApiCompleter::from_config(&make_config(Some("")));
        let _ = ApiCompleter::from_config(&make_config(Some("gsk-test-1234")));
    }

    #[test]
    fn endpoint_is_chat_completions() {
        let llm = ApiCompleter::from_config(&make_config(None));
        assert_eq!(llm.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn request_body_carries_model_and_limits() {
        let llm = ApiCompleter::from_config(&make_config(None));
        let body = llm.request_body("مرحبا");

        assert_eq!(body["model"], "llama3-8b-8192");
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "مرحبا");
    }

    #[test]
    fn custom_system_prompt_is_used() {
        let mut config = make_config(None);
        config.system_prompt = Some("You are a pirate.".into());
        let llm = ApiCompleter::from_config(&config);
        let body = llm.request_body("hi");
        assert_eq!(body["messages"][0]["content"], "You are a pirate.");
    }

    #[test]
    fn extract_reply_trims_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  أهلا بك \n" } }]
        });
        assert_eq!(extract_reply(&json).unwrap(), "أهلا بك");
    }

    #[test]
    fn extract_reply_rejects_missing_or_blank_content() {
        let missing = serde_json::json!({ "choices": [] });
        assert!(matches!(extract_reply(&missing), Err(LlmError::EmptyResponse)));

        let blank = serde_json::json!({ "choices": [{ "message": { "content": "   " } }] });
        assert!(matches!(extract_reply(&blank), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn completer_is_object_safe() {
        let llm: Box<dyn Completer> = Box::new(ApiCompleter::from_config(&make_config(None)));
        drop(llm);
    }

    #[tokio::test]
    async fn mock_counts_calls() {
        let llm = MockCompleter::ok("reply");
        assert_eq!(llm.complete("x").await.unwrap(), "reply");
        assert_eq!(llm.calls(), 1);
    }
}
