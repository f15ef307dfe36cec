//! Tracing-backed cycle reporter
//!
//! Writes one log line per cycle event: info for normal progress, error
//! for failed actions and aborted cycles, warn for a cycle summary that
//! includes failures.

use cloudmirror_core::domain::{ActionEffect, ActionOutcome, EntryKind, SyncAction, SyncPlan};
use cloudmirror_core::ports::{CycleSummary, ISyncReporter};
use tracing::{debug, error, info, warn};

/// [`ISyncReporter`] that forwards every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl TracingReporter {
    pub fn new() -> Self {
        Self
    }
}

impl ISyncReporter for TracingReporter {
    fn cycle_started(&self) {
        info!("Sync cycle started");
    }

    fn plan_ready(&self, plan: &SyncPlan) {
        info!(
            uploads = plan.uploads(),
            overwrites = plan.overwrites(),
            deletes = plan.deletes(),
            "Sync plan ready"
        );
        for action in plan.actions() {
            debug!(%action, "Planned");
        }
    }

    fn action_finished(&self, outcome: &ActionOutcome) {
        let path = outcome.action.path();
        let kind = outcome.action.kind();

        let Some(effect) = outcome.effect() else {
            error!(
                action = outcome.action.verb(),
                %kind,
                %path,
                cause = outcome.cause().unwrap_or_default(),
                "Sync action failed"
            );
            return;
        };

        match (effect, &outcome.action) {
            (ActionEffect::Uploaded, _) => info!(%path, "New file uploaded"),
            (ActionEffect::Overwritten, _) => info!(%path, "File updated"),
            (ActionEffect::Skipped, _) => info!(%path, "File already exists remotely, skipped"),
            (ActionEffect::Deleted, SyncAction::Delete(r)) if r.kind == EntryKind::Directory => {
                info!(%path, "Directory deleted")
            }
            (ActionEffect::Deleted, _) => info!(%path, "File deleted"),
            (ActionEffect::AlreadyAbsent, _) => info!(%path, "Already deleted remotely"),
            (ActionEffect::DirectoryEnsured, _) => info!(%path, "Directory created"),
        }
    }

    fn cycle_failed(&self, err: &anyhow::Error) {
        let message = format!("{err:#}");
        error!(error = %message, "Sync cycle failed");
    }

    fn cycle_finished(&self, summary: &CycleSummary) {
        if summary.is_clean() {
            info!(
                planned = summary.planned,
                uploaded = summary.uploaded,
                overwritten = summary.overwritten,
                skipped = summary.skipped,
                deleted = summary.deleted,
                directories = summary.directories,
                duration_ms = summary.duration_ms,
                "Sync cycle finished"
            );
        } else {
            warn!(
                planned = summary.planned,
                uploaded = summary.uploaded,
                overwritten = summary.overwritten,
                skipped = summary.skipped,
                deleted = summary.deleted,
                directories = summary.directories,
                failed = summary.failed,
                error = summary.error.as_deref().unwrap_or_default(),
                duration_ms = summary.duration_ms,
                "Sync cycle finished with errors"
            );
        }
    }
}
