//! Upload handling: raw multipart bytes → validated [`AudioClip`].
//!
//! ```text
//! multipart field → UploadValidator::validate → AudioClip → PipelineRunner
//!                      ├─ empty / unknown → AudioError (400), oversized (413)
//!                      └─ Container::sniff  → content type + filename
//! ```

pub mod upload;

pub use upload::{AudioClip, AudioError, Container, UploadValidator};
