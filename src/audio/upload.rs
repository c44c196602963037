//! Uploaded-clip validation and container sniffing.
//!
//! The pipeline never decodes audio; the transcription service does that.
//! [`UploadValidator`] only rejects uploads that cannot possibly be a clip
//! and works out a content type and filename to forward:
//!
//! | Check | Description |
//! |-------|-------------|
//! | Empty | Zero-byte uploads are rejected |
//! | Size | Larger than `max_bytes` is rejected |
//! | Format | Magic bytes must match a known container, or the client must have declared an `audio/*` / `video/*` type |
//!
//! # Example
//!
//! ```rust
//! use voice_relay::audio::{AudioError, Container, UploadValidator};
//!
//! let validator = UploadValidator::new(1024);
//! let wav = b"RIFF\0\0\0\0WAVEfmt ".to_vec();
//! let clip = validator.validate(wav, None, None).unwrap();
//! assert_eq!(clip.container(), Some(Container::Wav));
//! assert_eq!(clip.content_type(), "audio/wav");
//!
//! assert!(matches!(validator.validate(Vec::new(), None, None), Err(AudioError::Empty)));
//! ```

use bytes::Bytes;
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Reason an upload was rejected before entering the pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    #[error("uploaded audio file is empty")]
    Empty,

    #[error("uploaded audio is too large: {got} bytes (maximum {max})")]
    TooLarge { got: usize, max: usize },

    #[error("uploaded file is not a recognised audio format (declared {declared:?})")]
    UnrecognisedFormat { declared: Option<String> },
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Audio container families the transcription service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav,
    Mp3,
    Ogg,
    WebM,
    Mp4,
    Flac,
}

impl Container {
    /// Identify the container from its leading magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match data {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some(Self::Wav),
            [b'I', b'D', b'3', ..] => Some(Self::Mp3),
            [0xFF, b1, ..] if b1 & 0xE0 == 0xE0 => Some(Self::Mp3),
            [b'O', b'g', b'g', b'S', ..] => Some(Self::Ogg),
            [0x1A, 0x45, 0xDF, 0xA3, ..] => Some(Self::WebM),
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some(Self::Mp4),
            [b'f', b'L', b'a', b'C', ..] => Some(Self::Flac),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
            Self::WebM => "audio/webm",
            Self::Mp4 => "audio/mp4",
            Self::Flac => "audio/flac",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::WebM => "webm",
            Self::Mp4 => "m4a",
            Self::Flac => "flac",
        }
    }
}

// ---------------------------------------------------------------------------
// AudioClip
// ---------------------------------------------------------------------------

/// A validated upload, ready for transcription.
#[derive(Debug, Clone)]
pub struct AudioClip {
    bytes: Bytes,
    content_type: String,
    filename: String,
    container: Option<Container>,
}

impl AudioClip {
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Content type forwarded to the transcription service.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The sniffed container, when the magic bytes were recognised.
    pub fn container(&self) -> Option<Container> {
        self.container
    }
}

// ---------------------------------------------------------------------------
// UploadValidator
// ---------------------------------------------------------------------------

/// Validates uploads before they reach the pipeline.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    /// Maximum accepted upload size in bytes.
    pub max_bytes: usize,
}

impl UploadValidator {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Check `data` and decide the content type and filename to forward.
    ///
    /// The sniffed container wins over the client's declared type, because
    /// browsers and firmware often send `application/octet-stream`.
    pub fn validate(
        &self,
        data: impl Into<Bytes>,
        declared_type: Option<&str>,
        filename: Option<&str>,
    ) -> Result<AudioClip, AudioError> {
        let bytes: Bytes = data.into();

        if bytes.is_empty() {
            return Err(AudioError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(AudioError::TooLarge {
                got: bytes.len(),
                max: self.max_bytes,
            });
        }

        let declared = declared_type
            .map(|t| t.split(';').next().unwrap_or(t).trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty());
        let container = Container::sniff(&bytes);

        let content_type = match (container, declared.as_deref()) {
            (Some(c), _) => c.mime().to_string(),
            (None, Some(t)) if t.starts_with("audio/") || t.starts_with("video/") => t.to_string(),
            (None, _) => {
                return Err(AudioError::UnrecognisedFormat {
                    declared: declared_type.map(str::to_string),
                })
            }
        };

        let filename = match filename.map(str::trim).filter(|f| !f.is_empty()) {
            Some(name) => name.to_string(),
            None => format!(
                "recording.{}",
                container.map_or("bin", |c| c.extension())
            ),
        };

        Ok(AudioClip {
            bytes,
            content_type,
            filename,
            container,
        })
    }
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new(10 * 1024 * 1024)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
