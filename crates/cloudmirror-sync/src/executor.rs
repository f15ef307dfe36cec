//! Plan execution
//!
//! Every action of a [`SyncPlan`] becomes its own task in a
//! [`JoinSet`]; a [`Semaphore`] caps how many of them talk to the remote
//! store at once. Outcomes are handed back in completion order through an
//! [`OutcomeStream`].
//!
//! Failures are contained per action. An `Err` from the store, or a panic
//! inside the action, turns into an [`ActionOutcome`] with a failure cause
//! and never affects the other tasks.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cloudmirror_core::config::DEFAULT_CONCURRENCY;
use cloudmirror_core::domain::{ActionEffect, ActionOutcome, RemotePath, SyncAction, SyncPlan};
use cloudmirror_core::ports::{DeleteOutcome, IRemoteStore, PutOutcome};
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

// ============================================================================
// SyncExecutor
// ============================================================================

/// Runs sync plans against a remote store with bounded parallelism
#[derive(Clone)]
pub struct SyncExecutor {
    store: Arc<dyn IRemoteStore>,
    local_root: PathBuf,
    remote_root: RemotePath,
    concurrency: usize,
}

impl SyncExecutor {
    /// Creates an executor with the default concurrency limit
    ///
    /// # Arguments
    /// * `store` - Remote store all actions are applied to
    /// * `local_root` - Local sync root; action paths are resolved against it
    /// * `remote_root` - Remote folder the local root is mirrored into
    pub fn new(store: Arc<dyn IRemoteStore>, local_root: PathBuf, remote_root: RemotePath) -> Self {
        Self {
            store,
            local_root,
            remote_root,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets the worker limit (values below 1 are raised to 1)
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Dispatches every action of `plan`
    ///
    /// Must be called from within a tokio runtime. Tasks start immediately;
    /// dropping the returned stream before it is drained aborts whatever
    /// has not finished yet.
    pub fn execute(&self, plan: SyncPlan) -> OutcomeStream {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let total = plan.len();

        for action in plan {
            let semaphore = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let local_root = self.local_root.clone();
            let remote_root = self.remote_root.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return ActionOutcome::failure(action, e.to_string()),
                };

                debug!(action = %action, "Executing action");
                let result = AssertUnwindSafe(apply(
                    store.as_ref(),
                    &local_root,
                    &remote_root,
                    &action,
                ))
                .catch_unwind()
                .await;

                match result {
                    Ok(Ok(effect)) => ActionOutcome::success(action, effect),
                    Ok(Err(err)) => ActionOutcome::failure(action, format!("{err:#}")),
                    Err(panic) => {
                        let cause = format!("action panicked: {}", panic_message(panic.as_ref()));
                        ActionOutcome::failure(action, cause)
                    }
                }
            });
        }

        OutcomeStream { tasks, total }
    }
}

/// Maps one action onto remote store calls
async fn apply(
    store: &dyn IRemoteStore,
    local_root: &Path,
    remote_root: &RemotePath,
    action: &SyncAction,
) -> anyhow::Result<ActionEffect> {
    let record = action.record();
    let remote_path = remote_root.join_relative(&record.path);

    match action {
        SyncAction::Upload(record) | SyncAction::Overwrite(record) if record.is_directory() => {
            store.ensure_directory(&remote_path).await?;
            store.set_modified(&remote_path, record.modified_at).await?;
            Ok(ActionEffect::DirectoryEnsured)
        }
        SyncAction::Upload(record) => {
            let local_file = record.path.to_host_path(local_root);
            match store
                .put(&remote_path, &local_file, record.modified_at, false)
                .await?
            {
                PutOutcome::Uploaded => Ok(ActionEffect::Uploaded),
                PutOutcome::Skipped => Ok(ActionEffect::Skipped),
            }
        }
        SyncAction::Overwrite(record) => {
            let local_file = record.path.to_host_path(local_root);
            match store
                .put(&remote_path, &local_file, record.modified_at, true)
                .await?
            {
                PutOutcome::Uploaded => Ok(ActionEffect::Overwritten),
                PutOutcome::Skipped => Ok(ActionEffect::Skipped),
            }
        }
        SyncAction::Delete(_) => match store.delete(&remote_path).await? {
            DeleteOutcome::Deleted => Ok(ActionEffect::Deleted),
            DeleteOutcome::AlreadyAbsent => Ok(ActionEffect::AlreadyAbsent),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ============================================================================
// OutcomeStream
// ============================================================================

/// Outcomes of an executing plan, in completion order
pub struct OutcomeStream {
    tasks: JoinSet<ActionOutcome>,
    total: usize,
}

impl OutcomeStream {
    /// Waits for the next action to finish
    ///
    /// Returns `None` once every action has reported.
    pub async fn next(&mut self) -> Option<ActionOutcome> {
        loop {
            match self.tasks.join_next().await? {
                Ok(outcome) => return Some(outcome),
                // Panics are caught inside the task, so only cancellation lands here.
                Err(err) => error!(%err, "Sync task did not complete"),
            }
        }
    }

    /// Number of actions dispatched
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of actions that have not reported yet
    pub fn remaining(&self) -> usize {
        self.tasks.len()
    }

    /// Drains the stream
    pub async fn collect(mut self) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::with_capacity(self.total);
        while let Some(outcome) = self.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

impl std::fmt::Debug for OutcomeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeStream")
            .field("total", &self.total)
            .field("remaining", &self.tasks.len())
            .finish()
    }
}
