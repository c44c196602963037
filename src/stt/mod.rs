//! STT (Speech-to-Text) adapter module.
//!
//! # Architecture
//!
//! ```text
//! AudioClip ──▶ Transcriber (trait) ──▶ transcript text
//!                     │
//!                     └── WhisperApiTranscriber
//!                           POST {base_url}/audio/transcriptions
//!                           (multipart: model, language, file)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_relay::audio::UploadValidator;
//! use voice_relay::config::SttConfig;
//! use voice_relay::stt::{Transcriber, WhisperApiTranscriber};
//!
//! # async fn example(upload: Vec<u8>) {
//! let stt = WhisperApiTranscriber::from_config(&SttConfig::default());
//! let clip = UploadValidator::default().validate(upload, None, None).unwrap();
//! let text = stt.transcribe(&clip, "ar").await.unwrap();
//! println!("{text}");
//! # }
//! ```

pub mod engine;
pub mod whisper_api;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{SttError, Transcriber};
pub use whisper_api::WhisperApiTranscriber;

// test-only re-export so the pipeline and server tests can import
// MockTranscriber without reaching into `engine`.
#[cfg(test)]
pub use engine::MockTranscriber;
