//! Core transcription trait and error type.
//!
//! # Overview
//!
//! [`Transcriber`] is the interface used by the pipeline.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn Transcriber>`.
//!
//! [`WhisperApiTranscriber`](crate::stt::WhisperApiTranscriber) is the
//! production implementation.  [`MockTranscriber`] (available under
//! `#[cfg(test)]`) returns a pre-configured response so the pipeline can be
//! tested without network access.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::AudioClip;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the transcription step.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// HTTP transport or connection error.
    #[error("transcription request failed: {0}")]
    Request(String),

    /// The service did not answer within the configured timeout.
    #[error("transcription timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("transcription service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body was not the expected JSON.
    #[error("failed to parse transcription response: {0}")]
    Parse(String),

    /// The service heard nothing it could transcribe.
    #[error("transcription is empty")]
    EmptyTranscript,
}

impl From<reqwest::Error> for SttError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SttError::Timeout
        } else {
            SttError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Speech-to-text over an uploaded clip.
///
/// # Contract
///
/// - `language` is an ISO-639-1 hint, or `"auto"`.
/// - A successful result is trimmed and non-empty; silence is reported as
///   [`SttError::EmptyTranscript`].
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip, language: &str) -> Result<String, SttError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// MockTranscriber (test only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockTranscriber;


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::UploadValidator;

    fn clip() -> AudioClip {
        UploadValidator::default()
            .validate(b"OggS\0\x02".to_vec(), None, None)
            .unwrap()
    }

    #[tokio::test]
    async fn mock_ok_returns_configured_text() {
        let stt = MockTranscriber::ok("مرحبا");
        assert_eq!(stt.transcribe(&clip(), "ar").await.unwrap(), "مرحبا");
        assert_eq!(stt.calls(), 1);
    }

    #[tokio::test]
    async fn mock_err_returns_configured_error() {
        let stt = MockTranscriber::err(SttError::Timeout);
        assert!(matches!(
            stt.transcribe(&clip(), "ar").await.unwrap_err(),
            SttError::Timeout
        ));
    }

    #[test]
    fn box_dyn_transcriber_compiles() {
        let _: Box<dyn Transcriber> = Box::new(MockTranscriber::ok("ok"));
    }

    #[test]
    fn api_error_display_includes_status() {
        let e = SttError::Api {
            status: 401,
            message: "Invalid API Key".into(),
        };
        let text = e.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("Invalid API Key"));
    }
}
