//! Pipeline runner: drives one upload through STT → LLM → TTS → relay.
//!
//! # Pipeline flow
//!
//! ```text
//! AudioClip
//!   └─▶ [permit]  optional Semaphore (pipeline.max_concurrent_runs)
//!   └─▶ relay.begin_run()                                   [processing]
//!         └─▶ stt.transcribe   (timeout stt.timeout_secs)
//!               └─▶ llm.complete    (timeout llm.timeout_secs)
//!                     └─▶ tts.synthesize (timeout tts.timeout_secs)
//!                           ├─ Ok  → guard.deliver(bytes)   [ready_for_pickup]
//!                           └─ Err → guard.fail(stage)      [error]
//! ```
//!
//! Every stage error becomes a [`PipelineError`] naming the stage that
//! failed.  Nothing is retried.  The relay slot is only written on success,
//! so a failed run never disturbs a reply the device has not fetched yet.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::audio::AudioClip;
use crate::config::AppConfig;
use crate::llm::{Completer, LlmError};
use crate::relay::{AudioArtifact, Relay};
use crate::stt::{SttError, Transcriber};
use crate::tts::{SynthesizedAudio, Synthesizer, TtsError};

use super::state::Stage;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Why a run did not produce audio.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("transcription failed: {0}")]
    TranscriptionFailed(#[source] SttError),

    #[error("response generation failed: {0}")]
    CompletionFailed(#[source] LlmError),

    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(#[source] TtsError),

    /// The run task panicked or the admission semaphore was closed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// The stage that failed; `None` for [`PipelineError::Internal`].
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::TranscriptionFailed(_) => Some(Stage::Transcription),
            PipelineError::CompletionFailed(_) => Some(Stage::Completion),
            PipelineError::SynthesisFailed(_) => Some(Stage::Synthesis),
            PipelineError::Internal(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineOutcome / PipelineRun
// ---------------------------------------------------------------------------

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub transcript: String,
    pub reply: String,
    /// The artifact that was deposited in the relay.
    pub artifact: AudioArtifact,
}

impl PipelineOutcome {
    pub fn sequence(&self) -> u64 {
        self.artifact.sequence()
    }
}

/// Per-request working state.  Never shared between requests.
#[derive(Debug)]
struct PipelineRun {
    clip: AudioClip,
    transcript: Option<String>,
    reply: Option<String>,
}

impl PipelineRun {
    fn new(clip: AudioClip) -> Self {
        Self {
            clip,
            transcript: None,
            reply: None,
        }
    }
}

/// Upper bound for each adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub transcription: Duration,
    pub completion: Duration,
    pub synthesis: Duration,
}

impl StageTimeouts {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            transcription: Duration::from_secs(config.stt.timeout_secs),
            completion: Duration::from_secs(config.llm.timeout_secs),
            synthesis: Duration::from_secs(config.tts.timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

/// Runs uploads through the adapters and deposits replies in the relay.
///
/// Cheap to share as `Arc<PipelineRunner>`; runs are independent and may
/// overlap.  When several finish, the last one to deposit wins the slot.
pub struct PipelineRunner {
    relay: Arc<Relay>,
    stt: Arc<dyn Transcriber>,
    llm: Arc<dyn Completer>,
    tts: Arc<dyn Synthesizer>,
    stt_language: String,
    tts_language: String,
    timeouts: StageTimeouts,
    limiter: Option<Arc<Semaphore>>,
}

impl PipelineRunner {
    pub fn new(
        relay: Arc<Relay>,
        stt: Arc<dyn Transcriber>,
        llm: Arc<dyn Completer>,
        tts: Arc<dyn Synthesizer>,
        config: &AppConfig,
    ) -> Self {
        let limiter = config
            .pipeline
            .max_concurrent_runs
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        Self {
            relay,
            stt,
            llm,
            tts,
            stt_language: config.stt.language.clone(),
            tts_language: config.tts.language.clone(),
            timeouts: StageTimeouts::from_config(config),
            limiter,
        }
    }

    /// Replace the per-stage timeouts taken from the config.
    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    // -----------------------------------------------------------------------
    // Full run
    // -----------------------------------------------------------------------

    /// Transcribe, answer and synthesize `clip`, then deposit the audio.
    ///
    /// Status is `processing` for the duration of the call; afterwards it is
    /// `ready_for_pickup` on success or `error` carrying the failed stage.
    pub async fn run(&self, clip: AudioClip) -> Result<PipelineOutcome, PipelineError> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(
                Arc::clone(limiter)
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::Internal(e.to_string()))?,
            ),
            None => None,
        };

        let guard = self.relay.begin_run();
        log::info!(
            "pipeline: run started ({} bytes, {})",
            clip.len(),
            clip.content_type()
        );

        let mut run = PipelineRun::new(clip);
        match self.execute(&mut run).await {
            Ok(audio) => {
                let transcript = run.transcript.take().unwrap_or_default();
                let reply = run.reply.take().unwrap_or_default();
                let artifact = guard.deliver(audio.bytes, audio.media_type, reply.clone());
                log::info!(
                    "pipeline: run finished, artifact #{} ({} bytes) ready for pickup",
                    artifact.sequence(),
                    artifact.len()
                );
                Ok(PipelineOutcome {
                    transcript,
                    reply,
                    artifact,
                })
            }
            Err(e) => {
                log::error!(
                    "pipeline: {e} (transcript: {:?}, reply: {:?})",
                    run.transcript,
                    run.reply
                );
                match e.stage() {
                    Some(stage) => {
                        guard.fail(stage);
                    }
                    None => drop(guard),
                }
                Err(e)
            }
        }
    }

    /// Like [`run`](Self::run), but on its own tokio task.
    ///
    /// Dropping the returned future (a client that hung up) does not cancel
    /// the run; a panic inside it comes back as [`PipelineError::Internal`].
    pub async fn run_detached(
        self: &Arc<Self>,
        clip: AudioClip,
    ) -> Result<PipelineOutcome, PipelineError> {
        let runner = Arc::clone(self);
        tokio::spawn(async move { runner.run(clip).await })
            .await
            .map_err(|e| {
                log::error!("pipeline: run task failed: {e}");
                PipelineError::Internal(e.to_string())
            })?
    }

    async fn execute(&self, run: &mut PipelineRun) -> Result<SynthesizedAudio, PipelineError> {
        let transcript = self.transcribe(&run.clip).await?;
        log::debug!("pipeline: transcript = {transcript:?}");
        run.transcript = Some(transcript.clone());

        let reply = self.reply(&transcript).await?;
        log::debug!("pipeline: reply = {reply:?}");
        run.reply = Some(reply.clone());

        self.speak(&reply).await
    }

    // -----------------------------------------------------------------------
    // Single stages
    // -----------------------------------------------------------------------

    async fn transcribe(&self, clip: &AudioClip) -> Result<String, PipelineError> {
        let text = tokio::time::timeout(
            self.timeouts.transcription,
            self.stt.transcribe(clip, &self.stt_language),
        )
        .await
        .unwrap_or(Err(SttError::Timeout))
        .map_err(PipelineError::TranscriptionFailed)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::TranscriptionFailed(SttError::EmptyTranscript));
        }
        Ok(text.to_string())
    }

    /// Completion stage only.  Does not touch the relay or status.
    pub async fn reply(&self, text: &str) -> Result<String, PipelineError> {
        let reply = tokio::time::timeout(self.timeouts.completion, self.llm.complete(text))
            .await
            .unwrap_or(Err(LlmError::Timeout))
            .map_err(PipelineError::CompletionFailed)?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(PipelineError::CompletionFailed(LlmError::EmptyResponse));
        }
        Ok(reply.to_string())
    }

    /// Synthesis stage only.  Does not touch the relay or status.
    pub async fn speak(&self, text: &str) -> Result<SynthesizedAudio, PipelineError> {
        let audio = tokio::time::timeout(
            self.timeouts.synthesis,
            self.tts.synthesize(text, &self.tts_language),
        )
        .await
        .unwrap_or(Err(TtsError::Timeout))
        .map_err(PipelineError::SynthesisFailed)?;

        if audio.is_empty() {
            return Err(PipelineError::SynthesisFailed(TtsError::EmptyAudio));
        }
        Ok(audio)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
