//! Server settings structs, defaults, environment overrides and TOML
//! persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! keys it changes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Groq's OpenAI-compatible API root.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind, e.g. `"0.0.0.0"`.
    pub host: String,
    /// TCP port.  Overridden by the `PORT` environment variable.
    pub port: u16,
    /// Largest accepted request body in bytes; bigger uploads get 413.
    pub max_upload_bytes: usize,
    /// Allow cross-origin requests from any site.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 10_000,
            max_upload_bytes: 10 * 1024 * 1024,
            cors_permissive: true,
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper transcription API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// API root; `/audio/transcriptions` is appended.
    pub base_url: String,
    /// Bearer token.  `None` for local servers.
    pub api_key: Option<String>,
    /// Model identifier, e.g. `"whisper-large-v3"`.
    pub model: String,
    /// ISO-639-1 language hint, or `"auto"` to let the service detect it.
    pub language: String,
    /// Upper bound on one transcription call.
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: GROQ_BASE_URL.into(),
            api_key: None,
            model: "whisper-large-v3".into(),
            language: "ar".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the chat-completion step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    /// Bearer token.  `None` for local providers such as Ollama.
    pub api_key: Option<String>,
    /// Model identifier, e.g. `"llama3-8b-8192"`.
    pub model: String,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f32,
    /// Reply length cap; kept small because the reply is spoken.
    pub max_tokens: u32,
    /// Language of the assistant persona (`"ar"`, `"en"`, …).
    pub language: String,
    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
    /// Upper bound on one completion call.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: GROQ_BASE_URL.into(),
            api_key: None,
            model: "llama3-8b-8192".into(),
            temperature: 0.7,
            max_tokens: 150,
            language: "ar".into(),
            system_prompt: None,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsProvider / TtsConfig
// ---------------------------------------------------------------------------

/// Which speech-synthesis backend produces the reply audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsProvider {
    /// Google Translate's speech endpoint (what gTTS uses).  No key, MP3 out.
    #[default]
    GoogleTranslate,
    /// Any OpenAI-compatible `/audio/speech` endpoint.
    OpenAiCompatible,
}

/// Settings for the speech-synthesis step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub provider: TtsProvider,
    /// Language hint passed to the synthesizer.
    pub language: String,
    /// Google Translate host; `/translate_tts` is appended.
    pub google_base_url: String,
    /// API root for `OpenAiCompatible`; `/audio/speech` is appended.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model for `OpenAiCompatible`, e.g. `"tts-1"`.
    pub model: String,
    /// Voice for `OpenAiCompatible`, e.g. `"alloy"`.
    pub voice: String,
    /// Output format for `OpenAiCompatible`: `"mp3"`, `"wav"`, …
    pub response_format: String,
    /// Upper bound on one synthesis call (all chunks together).
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::default(),
            language: "ar".into(),
            google_base_url: "https://translate.google.com".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            model: "tts-1".into(),
            voice: "alloy".into(),
            response_format: "mp3".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Admission control for pipeline runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum runs in flight at once; `None` admits every upload.  Extra
    /// uploads wait for a free slot rather than being rejected.
    pub max_concurrent_runs: Option<usize>,
}

// ---------------------------------------------------------------------------
// DeliveryConfig
// ---------------------------------------------------------------------------

/// Optional push delivery alongside the pull endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Device URL that receives each reply as a POST.  `None` disables push.
    pub push_url: Option<String>,
    pub push_timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            push_url: None,
            push_timeout_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_relay::config::AppConfig;
///
/// // Settings file (or defaults), then PORT / GROQ_API_KEY from the env.
/// let config = AppConfig::load().unwrap().with_env_overrides();
/// println!("listening on {}", config.server.port);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub stt: SttConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub pipeline: PipelineConfig,
    pub delivery: DeliveryConfig,
}

impl AppConfig {
    /// Load configuration from `VOICE_RELAY_CONFIG` if set, otherwise from
    /// the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist.
    pub fn load() -> Result<Self> {
        match std::env::var_os("VOICE_RELAY_CONFIG") {
            Some(path) => Self::load_from(std::path::Path::new(&path)),
            None => Self::load_from(&AppPaths::new().settings_file),
        }
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `PORT`, `GROQ_API_KEY` and `OPENAI_API_KEY` from the process
    /// environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (the environment in production).
    ///
    /// `GROQ_API_KEY` takes precedence over `OPENAI_API_KEY`; whichever is
    /// found fills the STT and LLM keys that the file left empty.
    /// `OPENAI_API_KEY` alone also fills an empty TTS key.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = non_empty("PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => log::warn!("config: ignoring invalid PORT={port:?}"),
            }
        }

        let api_key = non_empty("GROQ_API_KEY").or_else(|| non_empty("OPENAI_API_KEY"));
        if let Some(key) = api_key {
            fill_if_empty(&mut self.stt.api_key, &key);
            fill_if_empty(&mut self.llm.api_key, &key);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            fill_if_empty(&mut self.tts.api_key, &key);
        }

        self
    }
}

fn fill_if_empty(slot: &mut Option<String>, value: &str) {
    if slot.as_deref().map_or(true, |s| s.trim().is_empty()) {
        *slot = Some(value.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
