//! Optional push delivery of each deposited artifact to a fixed device URL.
//!
//! Some ESP32 firmwares expose a small HTTP endpoint and want the reply
//! pushed to them.  [`PushNotifier`] subscribes to the relay and POSTs every
//! deposited artifact there.  It does not consume the slot, so the pull
//! endpoint keeps working whether or not the push succeeds.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::config::DeliveryConfig;
use crate::relay::{AudioArtifact, RelayEvent};

/// Errors from a single push attempt.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Request(String),

    #[error("push timed out")]
    Timeout,

    #[error("device rejected push with HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for PushError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PushError::Timeout
        } else {
            PushError::Request(e.to_string())
        }
    }
}

/// POSTs deposited artifacts to `url`.
#[derive(Debug, Clone)]
pub struct PushNotifier {
    client: reqwest::Client,
    url: String,
}

impl PushNotifier {
    /// Returns `None` when no `push_url` is configured.
    pub fn from_config(config: &DeliveryConfig) -> Option<Self> {
        let url = config.push_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.push_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Some(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one artifact to the device.
    pub async fn push(&self, artifact: &AudioArtifact) -> Result<(), PushError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, artifact.media_type())
            .header("X-Audio-Sequence", artifact.sequence())
            .body(artifact.bytes().clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::Status(status.as_u16()));
        }
        Ok(())
    }

    /// Forward every `Deposited` event until the relay is dropped.
    pub fn spawn(self, mut events: broadcast::Receiver<RelayEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            log::info!("push: delivering replies to {}", self.url);
            loop {
                match events.recv().await {
                    Ok(RelayEvent::Deposited { artifact, .. }) => {
                        match self.push(&artifact).await {
                            Ok(()) => log::info!("push: artifact #{} delivered", artifact.sequence()),
                            Err(e) => log::warn!("push: artifact #{} not delivered: {e}", artifact.sequence()),
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        log::warn!("push: skipped {n} relay events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            log::debug!("push: relay closed, stopping");
        })
    }
}
