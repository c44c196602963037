//! TTS (Text-to-Speech) adapter module.
//!
//! ```text
//! reply text ──▶ Synthesizer (trait) ──▶ SynthesizedAudio { bytes, media_type }
//!                     │
//!                     ├── GoogleTranslateTts       (keyless, chunked, MP3)
//!                     └── OpenAiSpeechSynthesizer  POST {base_url}/audio/speech
//! ```

pub mod engine;
pub mod google;
pub mod openai;

pub use engine::{build_synthesizer, SynthesizedAudio, Synthesizer, TtsError};
pub use google::{split_text, GoogleTranslateTts};
pub use openai::OpenAiSpeechSynthesizer;

#[cfg(test)]
pub use engine::MockSynthesizer;
