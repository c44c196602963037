//! Pipeline status state machine.
//!
//! [`PipelineStatus`] is what `/status` reports and what both the web client
//! and the ESP32 poll.  It is never stored on its own: the relay derives it
//! under its lock from [`StatusInputs`], so the status can never disagree
//! with whether audio is actually waiting in the slot.
//!
//! ```text
//! ready ──upload starts──▶ processing
//!                            ──all stages ok──▶ ready_for_pickup ──retrieve──▶ ready
//!                            ──stage fails───▶ error ──next upload──▶ processing
//! ```

use serde::Serialize;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The external call a pipeline run was making when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Speech-to-text on the uploaded clip.
    Transcription,
    /// Language-model reply to the transcript.
    Completion,
    /// Text-to-speech of the reply.
    Synthesis,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Transcription => "transcription",
            Stage::Completion => "completion",
            Stage::Synthesis => "synthesis",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// PipelineStatus
// ---------------------------------------------------------------------------

/// Aggregate state of the relay and the most recent pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    /// Idle: nothing running, nothing waiting.
    #[default]
    Ready,

    /// At least one pipeline run is in flight.
    Processing,

    /// A synthesized reply is waiting for the device to pull it.
    ReadyForPickup,

    /// The most recent run failed at `stage`.  Cleared by the next upload.
    Error { stage: Stage },
}

impl PipelineStatus {
    /// Wire name used in the `/status` JSON body.
    ///
    /// ```
    /// use voice_relay::pipeline::{PipelineStatus, Stage};
    ///
    /// assert_eq!(PipelineStatus::Ready.label(), "ready");
    /// assert_eq!(PipelineStatus::ReadyForPickup.label(), "ready_for_pickup");
    /// assert_eq!(PipelineStatus::Error { stage: Stage::Synthesis }.label(), "error");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStatus::Ready => "ready",
            PipelineStatus::Processing => "processing",
            PipelineStatus::ReadyForPickup => "ready_for_pickup",
            PipelineStatus::Error { .. } => "error",
        }
    }

    /// Returns `true` while a run is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineStatus::Processing)
    }

    /// The failing stage, when in `Error`.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineStatus::Error { stage } => Some(*stage),
            _ => None,
        }
    }

    /// Derive the status from the relay's guarded fields.
    ///
    /// Precedence: in-flight runs, then the last run's failure, then slot
    /// occupancy.
    pub fn derive(inputs: StatusInputs) -> Self {
        if inputs.in_flight > 0 {
            PipelineStatus::Processing
        } else if let Some(stage) = inputs.last_failure {
            PipelineStatus::Error { stage }
        } else if inputs.slot_occupied {
            PipelineStatus::ReadyForPickup
        } else {
            PipelineStatus::Ready
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for PipelineStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// StatusInputs
// ---------------------------------------------------------------------------

/// The facts [`PipelineStatus::derive`] needs, read under the relay lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusInputs {
    /// Number of pipeline runs that have begun and not yet finished.
    pub in_flight: usize,
    /// Failing stage of the most recently finished run, if it failed.
    pub last_failure: Option<Stage>,
    /// Whether the relay slot holds an unretrieved artifact.
    pub slot_occupied: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
