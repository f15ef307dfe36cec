//! Sync cycle driver
//!
//! One cycle = scan the local tree and list the remote folder (concurrently),
//! diff the two, execute the plan, and report. [`SyncCycleDriver::run_cycle`]
//! always returns a [`CycleSummary`]; no error or panic escapes it, so the
//! polling loop above can go straight back to sleep.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use cloudmirror_core::config::{Config, SyncMode};
use cloudmirror_core::domain::RemotePath;
use cloudmirror_core::ports::{CycleSummary, IRemoteStore, ISyncReporter};
use futures_util::FutureExt;
use tracing::instrument;

use crate::executor::SyncExecutor;
use crate::planner::plan;
use crate::scanner::LocalTreeScanner;

/// Runs complete list + scan + plan + execute passes
pub struct SyncCycleDriver {
    scanner: LocalTreeScanner,
    store: Arc<dyn IRemoteStore>,
    executor: SyncExecutor,
    reporter: Arc<dyn ISyncReporter>,
    local_root: PathBuf,
    remote_root: RemotePath,
}

impl SyncCycleDriver {
    /// Creates a new driver
    ///
    /// # Arguments
    /// * `scanner` - Local tree scanner (carries the sync mode)
    /// * `store` - Remote store to mirror into
    /// * `reporter` - Sink for cycle events
    /// * `local_root` - Local directory to mirror
    /// * `remote_root` - Remote folder receiving the mirror
    /// * `concurrency` - Worker limit for plan execution
    pub fn new(
        scanner: LocalTreeScanner,
        store: Arc<dyn IRemoteStore>,
        reporter: Arc<dyn ISyncReporter>,
        local_root: PathBuf,
        remote_root: RemotePath,
        concurrency: usize,
    ) -> Self {
        let executor =
            SyncExecutor::new(Arc::clone(&store), local_root.clone(), remote_root.clone())
                .with_concurrency(concurrency);
        Self {
            scanner,
            store,
            executor,
            reporter,
            local_root,
            remote_root,
        }
    }

    /// Creates a driver from a loaded configuration
    ///
    /// # Errors
    /// Returns error if `sync.cloud_folder_name` is not a usable remote path
    pub fn from_config(
        config: &Config,
        store: Arc<dyn IRemoteStore>,
        reporter: Arc<dyn ISyncReporter>,
    ) -> anyhow::Result<Self> {
        let remote_root = config
            .remote_root()
            .context("Invalid cloud folder name")?;
        Ok(Self::new(
            LocalTreeScanner::from_config(&config.sync),
            store,
            reporter,
            config.sync.local_folder.clone(),
            remote_root,
            config.sync.concurrency,
        ))
    }

    pub fn remote_root(&self) -> &RemotePath {
        &self.remote_root
    }

    /// Runs one full sync cycle
    ///
    /// Returns once every dispatched action has reported an outcome.
    #[instrument(skip(self), fields(local = %self.local_root.display(), remote = %self.remote_root))]
    pub async fn run_cycle(&self) -> CycleSummary {
        let started = Instant::now();
        self.reporter.cycle_started();

        let mut summary = CycleSummary::default();
        let result = AssertUnwindSafe(self.try_run_cycle(&mut summary))
            .catch_unwind()
            .await;

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(_) => Some(anyhow::anyhow!("sync cycle panicked")),
        };
        if let Some(err) = failure {
            self.reporter.cycle_failed(&err);
            summary.error = Some(format!("{err:#}"));
        }

        summary.set_duration(started.elapsed());
        self.reporter.cycle_finished(&summary);
        summary
    }

    async fn try_run_cycle(&self, summary: &mut CycleSummary) -> anyhow::Result<()> {
        let (local, remote) = tokio::join!(
            self.scanner.scan(&self.local_root),
            self.store.list(&self.remote_root),
        );
        let local = local.context("Failed to scan local folder")?;

        // Remote folders only take part when directories are mirrored too.
        let remote = match self.scanner.mode() {
            SyncMode::Files => remote.files_only(),
            SyncMode::All => remote,
        };

        let plan = plan(&local, &remote);
        summary.planned = plan.len();
        self.reporter.plan_ready(&plan);

        let mut outcomes = self.executor.execute(plan);
        while let Some(outcome) = outcomes.next().await {
            self.reporter.action_finished(&outcome);
            summary.record(&outcome);
        }

        Ok(())
    }
}
