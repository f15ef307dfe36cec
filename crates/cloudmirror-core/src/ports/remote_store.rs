//! Remote store port (driven/secondary port)
//!
//! This module defines the interface for the remote object store the local
//! tree is mirrored into. The shipped implementation targets a
//! Yandex-Disk-style REST API, but the trait only speaks in terms of
//! snapshots and remote paths.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.
//! - Implementations retry transient transport failures themselves; an
//!   `Err` returned from a mutating call is terminal for this cycle.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::newtypes::RemotePath;
use crate::domain::snapshot::Snapshot;

/// Result of a [`IRemoteStore::put`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Bytes were sent and the object now matches the local file
    Uploaded,
    /// An object already existed and `overwrite` was false; nothing was sent
    Skipped,
}

/// Result of a [`IRemoteStore::delete`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing existed at the path
    AlreadyAbsent,
}

/// Port trait for remote object-store operations
///
/// ## Implementation Notes
///
/// - `list` never fails: a transport failure is logged and reported as an
///   empty snapshot. Callers must treat an empty listing as "nothing known
///   remotely", which is why uploads of unknown paths use skip-if-exists.
/// - `ensure_directory` must tolerate concurrent callers creating
///   overlapping prefixes; "already exists" is success.
/// - `put` must ensure the parent directory chain before sending bytes.
/// - `delete` of a missing object is not an error.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Lists every object below `root`, keyed by path relative to `root`
    ///
    /// Directories are included as directory records; callers that only
    /// mirror files filter them out.
    async fn list(&self, root: &RemotePath) -> Snapshot;

    /// Creates `path` and any missing ancestors, parent first
    async fn ensure_directory(&self, path: &RemotePath) -> anyhow::Result<()>;

    /// Uploads `local_file` to `remote_path`
    ///
    /// # Arguments
    /// * `remote_path` - Destination object path
    /// * `local_file` - Local file whose bytes are sent
    /// * `modified_at` - Timestamp the remote object must report afterwards
    /// * `overwrite` - When false and the object exists, nothing is sent
    async fn put(
        &self,
        remote_path: &RemotePath,
        local_file: &Path,
        modified_at: DateTime<Utc>,
        overwrite: bool,
    ) -> anyhow::Result<PutOutcome>;

    /// Records `modified_at` on an existing object (used for directories)
    async fn set_modified(
        &self,
        remote_path: &RemotePath,
        modified_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Removes the object at `remote_path`
    async fn delete(&self, remote_path: &RemotePath) -> anyhow::Result<DeleteOutcome>;
}
