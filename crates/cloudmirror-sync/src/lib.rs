//! cloudmirror sync - one-way mirror engine
//!
//! Provides:
//! - Local tree scanning into a [`Snapshot`](cloudmirror_core::domain::Snapshot)
//! - Pure snapshot diffing into a [`SyncPlan`](cloudmirror_core::domain::SyncPlan)
//! - Bounded-concurrency plan execution against an
//!   [`IRemoteStore`](cloudmirror_core::ports::IRemoteStore)
//! - The per-cycle driver tying the three together
//!
//! ## Modules
//!
//! - [`scanner`] - Recursive local directory walk with ignore rules
//! - [`planner`] - Local vs remote diff
//! - [`executor`] - Worker pool over the remote store
//! - [`driver`] - One scan + list + plan + execute pass
//! - [`reporter`] - Tracing-backed cycle event sink

pub mod driver;
pub mod executor;
pub mod planner;
pub mod reporter;
pub mod scanner;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::PathBuf;

use thiserror::Error;

pub use driver::SyncCycleDriver;
pub use executor::{OutcomeStream, SyncExecutor};
pub use planner::plan;
pub use reporter::TracingReporter;
pub use scanner::LocalTreeScanner;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred while reading the local tree
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The configured sync root does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The configured sync root is a file, not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Reading a directory of the local tree failed
    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
