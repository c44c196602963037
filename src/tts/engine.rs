//! Core synthesis trait, output type and error type.
//!
//! [`Synthesizer`] is object-safe and `Send + Sync`; the pipeline holds it as
//! `Arc<dyn Synthesizer>`.  [`build_synthesizer`] picks the backend named in
//! [`TtsConfig::provider`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::config::{TtsConfig, TtsProvider};
use crate::tts::google::GoogleTranslateTts;
use crate::tts::openai::OpenAiSpeechSynthesizer;

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum TtsError {
    /// HTTP transport or connection error.
    #[error("speech request failed: {0}")]
    Request(String),

    #[error("speech synthesis timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("speech service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Nothing to say.
    #[error("no text to synthesize")]
    EmptyText,

    /// The service answered 200 with no audio.
    #[error("speech service returned no audio")]
    EmptyAudio,
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SynthesizedAudio
// ---------------------------------------------------------------------------

/// Encoded audio produced by a synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Bytes,
    /// MIME type of `bytes`, e.g. `"audio/mpeg"`.
    pub media_type: String,
}

impl SynthesizedAudio {
    pub fn new(bytes: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Synthesizer trait
// ---------------------------------------------------------------------------

/// Text-to-speech.
///
/// `language` is an ISO-639-1 hint; backends with fixed voices may ignore
/// it.  A successful result is never empty.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<SynthesizedAudio, TtsError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Synthesizer>) {}
};

/// Build the synthesizer selected by `config.provider`.
pub fn build_synthesizer(config: &TtsConfig) -> Arc<dyn Synthesizer> {
    match config.provider {
        TtsProvider::GoogleTranslate => Arc::new(GoogleTranslateTts::from_config(config)),
        TtsProvider::OpenAiCompatible => Arc::new(OpenAiSpeechSynthesizer::from_config(config)),
    }
}

// ---------------------------------------------------------------------------
// MockSynthesizer (test only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockSynthesizer;

#[cfg(test)]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Returns fixed audio or a fixed error, optionally after a delay.
    pub struct MockSynthesizer {
        response: Result<SynthesizedAudio, TtsError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MockSynthesizer {
        pub fn ok(bytes: Vec<u8>, media_type: &str) -> Self {
            Self {
                response: Ok(SynthesizedAudio::new(bytes, media_type)),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn err(error: TtsError) -> Self {
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
    impl Synthesizer for MockSynthesizer {
        async fn synthesize(
            &self,
            _text: &str,
            _language: &str,
        ) -> Result<SynthesizedAudio, TtsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response.clone()
        }
    }
}
