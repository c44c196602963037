//! Language-model module: transcript in, spoken-reply text out.
//!
//! This module provides:
//! * [`Completer`]: async trait implemented by all completion backends.
//! * [`ApiCompleter`]: OpenAI-compatible chat-completions backend.
//! * [`PromptBuilder`]: the assistant persona (Arabic / English).
//! * [`LlmError`]: error variants for LLM operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_relay::config::AppConfig;
//! use voice_relay::llm::{ApiCompleter, Completer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default().with_env_overrides();
//!     let llm = ApiCompleter::from_config(&config.llm);
//!     let reply = llm.complete("ما هي عاصمة مصر؟").await.unwrap();
//!     println!("{reply}");
//! }
//! ```

pub mod completer;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use completer::{ApiCompleter, Completer, LlmError};
pub use prompt::PromptBuilder;

#[cfg(test)]
pub use completer::MockCompleter;
