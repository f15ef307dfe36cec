//! Remote store adapter
//!
//! Implements [`IRemoteStore`] on top of [`DiskClient`]:
//!
//! - `list` walks the folder tree page by page and never fails
//! - `ensure_directory` creates each missing prefix under a per-path lock
//! - `put` is skip-if-exists unless `overwrite`, and stamps the local mtime
//!   on the uploaded object so the next listing reports it unchanged
//! - `delete` treats a missing object as already deleted

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use cloudmirror_core::config::Config;
use cloudmirror_core::domain::{FileRecord, RelativePath, RemotePath, Snapshot};
use cloudmirror_core::ports::{DeleteOutcome, IRemoteStore, PutOutcome};
use tracing::{debug, error, info, instrument, warn};

use crate::client::{DeleteStatus, DiskClient, FolderStatus};
use crate::locks::DirectoryLocks;
use crate::DiskError;

/// Default number of children requested per listing page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Disk-backed implementation of [`IRemoteStore`]
#[derive(Debug)]
pub struct DiskRemoteStore {
    client: Arc<DiskClient>,
    locks: DirectoryLocks,
    page_size: u32,
    permanent_delete: bool,
}

impl DiskRemoteStore {
    pub fn new(client: Arc<DiskClient>) -> Self {
        Self {
            client,
            locks: DirectoryLocks::new(),
            page_size: DEFAULT_PAGE_SIZE,
            permanent_delete: false,
        }
    }

    /// Builds the store from a loaded configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed
    pub fn from_config(config: &Config) -> Result<Self, DiskError> {
        let client = DiskClient::from_config(&config.remote, config.auth.access_token.clone())?;
        Ok(Self::new(Arc::new(client))
            .with_page_size(config.remote.page_size)
            .with_permanent_delete(config.remote.permanent_delete))
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_permanent_delete(mut self, permanent: bool) -> Self {
        self.permanent_delete = permanent;
        self
    }

    pub fn client(&self) -> &DiskClient {
        &self.client
    }

    /// Walks every folder below `root`, depth first
    async fn walk(&self, root: &RemotePath) -> Result<Snapshot, DiskError> {
        let mut snapshot = Snapshot::new();
        let mut pending: Vec<(RemotePath, Option<RelativePath>)> = vec![(root.clone(), None)];

        while let Some((dir, prefix)) = pending.pop() {
            let mut offset: u64 = 0;
            loop {
                let Some(page) = self
                    .client
                    .get_resource(dir.as_str(), self.page_size, offset)
                    .await?
                else {
                    // Root missing: nothing mirrored yet. Subfolder missing: removed mid-walk.
                    debug!(path = %dir, "Remote folder not found");
                    break;
                };
                let is_dir = page.is_dir();
                let Some(children) = page.embedded else {
                    if prefix.is_none() && !is_dir {
                        warn!(path = %dir, "Remote root is a file, treating as empty");
                    }
                    break;
                };

                let fetched = children.items.len() as u64;
                for item in children.items {
                    let relative = match &prefix {
                        None => RelativePath::new(item.name.as_str()),
                        Some(p) => RelativePath::new(format!("{p}/{}", item.name)),
                    };
                    let relative = match relative {
                        Ok(r) => r,
                        Err(err) => {
                            warn!(name = %item.name, %err, "Skipping remote item with unusable name");
                            continue;
                        }
                    };

                    let modified_at = item.effective_modified();
                    if item.is_dir() {
                        pending.push((root.join_relative(&relative), Some(relative.clone())));
                        snapshot.insert(FileRecord::directory(relative, modified_at));
                    } else {
                        snapshot.insert(FileRecord::file(relative, modified_at));
                    }
                }

                offset += fetched;
                let exhausted = match children.total {
                    Some(total) => offset >= total,
                    None => fetched < u64::from(self.page_size),
                };
                if fetched == 0 || exhausted {
                    break;
                }
            }
        }

        Ok(snapshot)
    }

    async fn create_directory_chain(&self, path: &RemotePath) -> Result<(), DiskError> {
        for dir in path.ancestors() {
            let _guard = self.locks.lock(dir.as_str()).await;

            if self
                .client
                .get_resource(dir.as_str(), 1, 0)
                .await?
                .is_some()
            {
                continue;
            }
            match self.client.create_folder(dir.as_str()).await? {
                FolderStatus::Created => info!(path = %dir, "Created remote directory"),
                FolderStatus::AlreadyExists => debug!(path = %dir, "Remote directory already exists"),
            }
        }
        Ok(())
    }

    /// Writes the mtime property, waiting out the delay between an upload
    /// completing and the resource becoming visible
    async fn stamp_mtime(&self, path: &RemotePath, modified_at: DateTime<Utc>) -> Result<(), DiskError> {
        let policy = *self.client.retry_policy();
        let mut attempt = 0;
        loop {
            match self.client.set_mtime(path.as_str(), modified_at).await {
                Err(DiskError::NotFound(_)) if attempt < policy.max_retries => {
                    let delay = policy.backoff(attempt);
                    debug!(%path, attempt, delay_ms = delay.as_millis() as u64, "Uploaded resource not visible yet");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait::async_trait]
impl IRemoteStore for DiskRemoteStore {
    #[instrument(skip(self), fields(root = %root))]
    async fn list(&self, root: &RemotePath) -> Snapshot {
        match self.walk(root).await {
            Ok(snapshot) => {
                debug!(entries = snapshot.len(), "Remote listing complete");
                snapshot
            }
            Err(err) => {
                error!(error = %err, "Failed to list remote folder, treating it as empty");
                Snapshot::new()
            }
        }
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn ensure_directory(&self, path: &RemotePath) -> anyhow::Result<()> {
        self.create_directory_chain(path)
            .await
            .with_context(|| format!("Failed to create remote directory {path}"))
    }

    #[instrument(skip(self, local_file, modified_at), fields(path = %remote_path))]
    async fn put(
        &self,
        remote_path: &RemotePath,
        local_file: &Path,
        modified_at: DateTime<Utc>,
        overwrite: bool,
    ) -> anyhow::Result<PutOutcome> {
        if let Some(parent) = remote_path.parent().filter(|p| !p.is_root()) {
            self.ensure_directory(&parent).await?;
        }

        if !overwrite
            && self
                .client
                .get_resource(remote_path.as_str(), 1, 0)
                .await?
                .is_some()
        {
            debug!("Remote object exists, skipping upload");
            return Ok(PutOutcome::Skipped);
        }

        let link = match self.client.upload_link(remote_path.as_str(), overwrite).await {
            Ok(link) => link,
            // Lost a race with another writer since the existence check.
            Err(DiskError::Conflict(_)) if !overwrite => return Ok(PutOutcome::Skipped),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to request upload URL for {remote_path}"))
            }
        };

        let bytes = tokio::fs::read(local_file)
            .await
            .with_context(|| format!("Failed to read local file {}", local_file.display()))?;
        self.client
            .upload_bytes(&link, bytes)
            .await
            .with_context(|| format!("Failed to upload {remote_path}"))?;

        self.stamp_mtime(remote_path, modified_at)
            .await
            .with_context(|| format!("Failed to record modification time on {remote_path}"))?;

        Ok(PutOutcome::Uploaded)
    }

    #[instrument(skip(self), fields(path = %remote_path))]
    async fn set_modified(
        &self,
        remote_path: &RemotePath,
        modified_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.client
            .set_mtime(remote_path.as_str(), modified_at)
            .await
            .with_context(|| format!("Failed to record modification time on {remote_path}"))
    }

    #[instrument(skip(self), fields(path = %remote_path))]
    async fn delete(&self, remote_path: &RemotePath) -> anyhow::Result<DeleteOutcome> {
        let status = self
            .client
            .delete_resource(remote_path.as_str(), self.permanent_delete)
            .await
            .with_context(|| format!("Failed to delete {remote_path}"))?;
        Ok(match status {
            DeleteStatus::Deleted => DeleteOutcome::Deleted,
            DeleteStatus::NotFound => DeleteOutcome::AlreadyAbsent,
        })
    }
}
