//! Sync reporter port
//!
//! The cycle driver never logs through process-wide state directly; it is
//! handed an [`ISyncReporter`] and pushes every event through it. The
//! daemon wires in a tracing-backed implementation, tests wire in a
//! recorder.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::plan::{ActionEffect, ActionOutcome, SyncPlan};

/// Terminal summary of one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Number of actions the planner produced
    pub planned: usize,
    pub uploaded: usize,
    pub overwritten: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub directories: usize,
    pub failed: usize,
    /// Wall-clock duration of the cycle in milliseconds
    pub duration_ms: u64,
    /// Set when the cycle aborted before or during planning
    pub error: Option<String>,
}

impl CycleSummary {
    /// Folds one outcome into the counters
    pub fn record(&mut self, outcome: &ActionOutcome) {
        match outcome.effect() {
            Some(ActionEffect::Uploaded) => self.uploaded += 1,
            Some(ActionEffect::Overwritten) => self.overwritten += 1,
            Some(ActionEffect::Skipped) => self.skipped += 1,
            Some(ActionEffect::Deleted) | Some(ActionEffect::AlreadyAbsent) => self.deleted += 1,
            Some(ActionEffect::DirectoryEnsured) => self.directories += 1,
            None => self.failed += 1,
        }
    }

    /// Number of outcomes folded in so far
    pub fn completed(&self) -> usize {
        self.uploaded
            + self.overwritten
            + self.skipped
            + self.deleted
            + self.directories
            + self.failed
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_ms = duration.as_millis() as u64;
    }

    /// True when the cycle ran to completion without a single failure
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.error.is_none()
    }
}

/// Sink for sync cycle events
///
/// Implementations must be cheap and non-blocking; they are called inline
/// from the driver while workers are still running.
pub trait ISyncReporter: Send + Sync {
    /// A cycle is starting
    fn cycle_started(&self);

    /// The planner produced `plan`
    fn plan_ready(&self, plan: &SyncPlan);

    /// One action finished, successfully or not
    fn action_finished(&self, outcome: &ActionOutcome);

    /// The cycle aborted before executing (scan failure and the like)
    fn cycle_failed(&self, error: &anyhow::Error);

    /// The cycle is over; always called exactly once per cycle
    fn cycle_finished(&self, summary: &CycleSummary);
}
