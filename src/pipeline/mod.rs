//! Pipeline module: one upload in, one spoken reply deposited in the relay.
//!
//! # Architecture
//!
//! ```text
//! POST /process-audio
//!        │
//!        ▼
//! PipelineRunner::run_detached(clip)   ← own tokio task
//!        │
//!        ├─ relay.begin_run()            status = processing
//!        ├─ Transcriber::transcribe      ─┐
//!        ├─ Completer::complete           ├─ each under tokio::time::timeout
//!        ├─ Synthesizer::synthesize      ─┘
//!        │
//!        ├─ Ok  → RunGuard::deliver      status = ready_for_pickup
//!        └─ Err → RunGuard::fail(stage)  status = error
//! ```
//!
//! [`PipelineStatus`] is never stored; the relay derives it from its own
//! locked state on every read (see [`state`]).

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{PipelineError, PipelineOutcome, PipelineRunner, StageTimeouts};
pub use state::{PipelineStatus, Stage, StatusInputs};
