//! Voice relay server for push-to-talk devices.
//!
//! A device (typically an ESP32 with a microphone and a speaker) uploads a
//! recorded clip; the server transcribes it, asks a language model for a
//! reply, synthesizes that reply as speech and parks the audio in a
//! single-slot relay until the device pulls it.
//!
//! ```text
//! POST /process-audio ──▶ stt ──▶ llm ──▶ tts ──▶ relay ◀── GET /get-audio-stream
//!                                                   │
//!                                      GET /status ─┘
//! ```

pub mod audio;
pub mod config;
pub mod http_util;
pub mod llm;
pub mod pipeline;
pub mod relay;
pub mod server;
pub mod stt;
pub mod tts;
