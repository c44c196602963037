//! Configuration module for the voice relay server.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each
//! subsystem, `AppPaths` for the platform settings location, TOML
//! persistence and environment overrides.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, DeliveryConfig, LlmConfig, PipelineConfig, ServerConfig, SttConfig, TtsConfig,
    TtsProvider, GROQ_BASE_URL,
};
