//! Single-slot audio relay between the pipeline and the polling device.
//!
//! The ESP32 cannot accept inbound connections, so the server parks each
//! finished reply in a one-item mailbox and the device pulls it with
//! `GET /get-audio-stream`.
//!
//! # Semantics
//!
//! * [`Relay::deposit`] always succeeds; the newest artifact replaces any
//!   unretrieved one.
//! * [`Relay::retrieve`] is consume-on-read: the artifact is removed as it
//!   is returned, so each reply is played exactly once.
//! * [`Relay::peek_status`] never consumes anything.
//!
//! Slot occupancy, the number of in-flight runs and the last failure live
//! behind one [`std::sync::Mutex`]; [`PipelineStatus`] is derived from them
//! on every read.  The lock is never held across an `.await`.
//!
//! ```text
//! PipelineRunner ──begin_run()──▶ RunGuard ──deliver(bytes)──▶ slot
//!                                          ──fail(stage)
//!                                          ──drop (panic / cancel)
//! GET /get-audio-stream ──retrieve()──▶ slot.take()
//! subscribers (push delivery) ◀── RelayEvent broadcast
//! ```

pub mod artifact;
pub mod push;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::pipeline::state::{PipelineStatus, Stage, StatusInputs};

pub use artifact::AudioArtifact;
pub use push::{PushError, PushNotifier};

const EVENT_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// RelayEvent
// ---------------------------------------------------------------------------

/// Published to subscribers after each change to the slot.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A new artifact now occupies the slot.  `replaced` is the sequence of
    /// an unretrieved artifact it displaced.
    Deposited {
        artifact: AudioArtifact,
        replaced: Option<u64>,
    },
    /// The device pulled the artifact.
    Retrieved { sequence: u64 },
    /// The slot was reset administratively.
    Cleared { discarded: Option<u64> },
}

// ---------------------------------------------------------------------------
// RelaySnapshot
// ---------------------------------------------------------------------------

/// A consistent view of the relay taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySnapshot {
    pub status: PipelineStatus,
    pub has_audio: bool,
    /// Sequence of the waiting artifact, if any.
    pub sequence: Option<u64>,
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RelayInner {
    slot: Option<AudioArtifact>,
    in_flight: usize,
    last_failure: Option<Stage>,
}

impl RelayInner {
    fn status(&self) -> PipelineStatus {
        PipelineStatus::derive(StatusInputs {
            in_flight: self.in_flight,
            last_failure: self.last_failure,
            slot_occupied: self.slot.is_some(),
        })
    }

    fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            status: self.status(),
            has_audio: self.slot.is_some(),
            sequence: self.slot.as_ref().map(AudioArtifact::sequence),
        }
    }

    /// Replace the slot contents, returning the displaced sequence.
    fn put(&mut self, artifact: AudioArtifact) -> Option<u64> {
        self.slot
            .replace(artifact)
            .map(|old| old.sequence())
    }

    fn end_run(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

/// Thread-safe single-item mailbox plus the status it implies.
///
/// Share it as `Arc<Relay>`; every method takes `&self`.
#[derive(Debug)]
pub struct Relay {
    inner: Mutex<RelayInner>,
    sequence: AtomicU64,
    events: broadcast::Sender<RelayEvent>,
}

impl Relay {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(RelayInner::default()),
            sequence: AtomicU64::new(0),
            events,
        }
    }

    /// Allocate the next artifact sequence number (starts at 1).
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Put `artifact` in the slot, discarding any unretrieved one.
    ///
    /// Like a successful run, this forgets the last failure, so status
    /// becomes `ready_for_pickup` unless a run is still in flight.
    pub fn deposit(&self, artifact: AudioArtifact) {
        let replaced = {
            let mut inner = self.lock();
            inner.last_failure = None;
            inner.put(artifact.clone())
        };
        self.announce_deposit(artifact, replaced);
    }

    /// Take the waiting artifact, leaving the slot empty.
    pub fn retrieve(&self) -> Option<AudioArtifact> {
        let artifact = self.lock().slot.take()?;
        log::info!(
            "relay: artifact #{} retrieved ({} bytes, waited {:.1}s)",
            artifact.sequence(),
            artifact.len(),
            artifact.age().as_secs_f32()
        );
        let _ = self.events.send(RelayEvent::Retrieved {
            sequence: artifact.sequence(),
        });
        Some(artifact)
    }

    /// Empty the slot and forget the last failure.
    ///
    /// Runs already in flight are unaffected and may still deposit.
    pub fn clear(&self) {
        let discarded = {
            let mut inner = self.lock();
            inner.last_failure = None;
            inner.slot.take().map(|a| a.sequence())
        };
        log::info!("relay: cleared (discarded: {discarded:?})");
        let _ = self.events.send(RelayEvent::Cleared { discarded });
    }

    /// Current status and occupancy, without side effects.
    pub fn peek_status(&self) -> RelaySnapshot {
        self.lock().snapshot()
    }

    pub fn has_audio(&self) -> bool {
        self.lock().slot.is_some()
    }

    pub fn status(&self) -> PipelineStatus {
        self.lock().status()
    }

    /// Receive a [`RelayEvent`] for every later change to the slot.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    /// Mark a pipeline run as started: status becomes `processing` and any
    /// earlier failure is forgotten.
    ///
    /// The run ends when the returned guard is resolved with
    /// [`RunGuard::deliver`] or [`RunGuard::fail`], or dropped.
    pub fn begin_run(self: &Arc<Self>) -> RunGuard {
        {
            let mut inner = self.lock();
            inner.in_flight += 1;
            inner.last_failure = None;
            log::debug!("relay: run started ({} in flight)", inner.in_flight);
        }
        RunGuard {
            relay: Arc::clone(self),
            finished: false,
        }
    }

    fn announce_deposit(&self, artifact: AudioArtifact, replaced: Option<u64>) {
        if let Some(old) = replaced {
            log::warn!(
                "relay: artifact #{old} was never retrieved; replaced by #{}",
                artifact.sequence()
            );
        }
        log::info!(
            "relay: artifact #{} deposited ({} bytes, {})",
            artifact.sequence(),
            artifact.len(),
            artifact.media_type()
        );
        let _ = self.events.send(RelayEvent::Deposited { artifact, replaced });
    }

    // The guarded fields are only assigned whole values, so a panic on
    // another thread cannot leave them half-updated.
    fn lock(&self) -> MutexGuard<'_, RelayInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// RunGuard
// ---------------------------------------------------------------------------

/// Keeps a pipeline run counted as in flight.
///
/// Dropping it unresolved (a panic, a cancelled future) ends the run
/// without recording a failure, so status cannot stay `processing`.
#[derive(Debug)]
#[must_use = "dropping the guard ends the run immediately"]
pub struct RunGuard {
    relay: Arc<Relay>,
    finished: bool,
}

impl RunGuard {
    /// Deposit a caller-stamped `artifact` and end the run.  Unlike
    /// [`RunGuard::deliver`] it cannot guarantee the surviving artifact
    /// carries the highest sequence.
    #[cfg(test)]
    pub(crate) fn succeed(mut self, artifact: AudioArtifact) -> RelaySnapshot {
        self.finished = true;
        let (replaced, snapshot) = {
            let mut inner = self.relay.lock();
            let replaced = inner.put(artifact.clone());
            inner.last_failure = None;
            inner.end_run();
            (replaced, inner.snapshot())
        };
        self.relay.announce_deposit(artifact, replaced);
        snapshot
    }

    /// Stamp the next sequence number, deposit and end the run in one
    /// critical section, so the surviving artifact always carries the
    /// highest sequence handed out so far.
    pub fn deliver(
        mut self,
        bytes: impl Into<Bytes>,
        media_type: impl Into<String>,
        reply_text: impl Into<String>,
    ) -> AudioArtifact {
        self.finished = true;
        let (artifact, replaced) = {
            let mut inner = self.relay.lock();
            let artifact =
                AudioArtifact::new(self.relay.next_sequence(), bytes, media_type, reply_text);
            let replaced = inner.put(artifact.clone());
            inner.last_failure = None;
            inner.end_run();
            (artifact, replaced)
        };
        self.relay.announce_deposit(artifact.clone(), replaced);
        artifact
    }

    /// End the run, recording the failing stage.  The slot is untouched.
    pub fn fail(mut self, stage: Stage) -> RelaySnapshot {
        self.finished = true;
        let mut inner = self.relay.lock();
        inner.last_failure = Some(stage);
        inner.end_run();
        inner.snapshot()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!("relay: run abandoned before finishing");
            self.relay.lock().end_run();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
