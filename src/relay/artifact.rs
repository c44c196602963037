//! The finished reply audio handed from the pipeline to the device.

use std::time::{Duration, Instant};

use bytes::Bytes;

/// An immutable synthesized reply.
///
/// Created exactly once per successful pipeline run and owned by the
/// [`Relay`](crate::relay::Relay) until it is retrieved or overwritten.
/// Cloning is cheap: the payload is a reference-counted [`Bytes`].
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    sequence: u64,
    media_type: String,
    bytes: Bytes,
    reply_text: String,
    created_at: Instant,
}

impl AudioArtifact {
    /// Wrap synthesized audio.  `sequence` comes from
    /// [`Relay::next_sequence`](crate::relay::Relay::next_sequence).
    pub fn new(
        sequence: u64,
        bytes: impl Into<Bytes>,
        media_type: impl Into<String>,
        reply_text: impl Into<String>,
    ) -> Self {
        Self {
            sequence,
            media_type: media_type.into(),
            bytes: bytes.into(),
            reply_text: reply_text.into(),
            created_at: Instant::now(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// MIME type of the payload, e.g. `"audio/mpeg"`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The reply text this audio speaks.
    pub fn reply_text(&self) -> &str {
        &self.reply_text
    }

    /// Time since the artifact was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Consume the artifact, returning the payload.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}
