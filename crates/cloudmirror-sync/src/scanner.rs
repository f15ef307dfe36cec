//! Local tree scanner
//!
//! Walks the sync root and builds a [`Snapshot`] of relative path to
//! modification time. Ignored and hidden directories are pruned before
//! recursion, so nothing below them is ever visited.

use std::collections::HashSet;
use std::fs::Metadata;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use cloudmirror_core::config::{SyncConfig, SyncMode};
use cloudmirror_core::domain::{FileRecord, RelativePath, Snapshot};
use tracing::{debug, instrument, warn};

use crate::SyncError;

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send + 'a>>;

/// Produces local snapshots according to a sync mode and ignore list
#[derive(Debug, Clone)]
pub struct LocalTreeScanner {
    mode: SyncMode,
    ignore_dirs: HashSet<String>,
}

impl LocalTreeScanner {
    pub fn new<I, S>(mode: SyncMode, ignore_dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode,
            ignore_dirs: ignore_dirs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.sync_mode, config.ignore_dirs.iter().cloned())
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Scans `root` recursively
    ///
    /// Fails only when `root` itself cannot be read. Unreadable
    /// subdirectories and entries that vanish mid-walk are logged and
    /// skipped.
    #[instrument(skip(self), fields(root = %root.display(), mode = %self.mode))]
    pub async fn scan(&self, root: &Path) -> Result<Snapshot, SyncError> {
        let metadata = match tokio::fs::metadata(root).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::PathNotFound(root.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Err(SyncError::NotADirectory(root.to_path_buf()));
        }

        let mut snapshot = Snapshot::new();
        self.walk_directory(root, root, &mut snapshot).await?;

        debug!(entries = snapshot.len(), "local scan complete");
        Ok(snapshot)
    }

    fn walk_directory<'a>(
        &'a self,
        dir: &'a Path,
        root: &'a Path,
        snapshot: &'a mut Snapshot,
    ) -> WalkFuture<'a> {
        Box::pin(async move {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(source) if dir == root => {
                    return Err(SyncError::ReadDir {
                        path: dir.to_path_buf(),
                        source,
                    });
                }
                Err(err) => {
                    warn!(path = %dir.display(), %err, "Skipping unreadable directory");
                    return Ok(());
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        warn!(path = %dir.display(), %err, "Directory listing interrupted");
                        break;
                    }
                };

                let entry_path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();

                // Symlinked files are followed; symlinked directories are not.
                let metadata = match tokio::fs::metadata(&entry_path).await {
                    Ok(m) => m,
                    Err(err) => {
                        debug!(path = %entry_path.display(), %err, "Entry vanished during scan");
                        continue;
                    }
                };
                let is_link = entry
                    .file_type()
                    .await
                    .map(|t| t.is_symlink())
                    .unwrap_or(false);

                if metadata.is_dir() {
                    // Dot-directories are traversed; only ignore_dirs and attributes prune.
                    if is_link
                        || self.ignore_dirs.contains(&name)
                        || has_hidden_attribute(&metadata)
                    {
                        debug!(path = %entry_path.display(), "Pruning directory");
                        continue;
                    }
                    if self.mode == SyncMode::All {
                        if let Some(record) =
                            record_for(root, &entry_path, &metadata, FileRecord::directory)
                        {
                            snapshot.insert(record);
                        }
                    }
                    self.walk_directory(&entry_path, root, snapshot).await?;
                } else if metadata.is_file() {
                    if is_hidden(&name, &metadata) {
                        continue;
                    }
                    if let Some(record) = record_for(root, &entry_path, &metadata, FileRecord::file)
                    {
                        snapshot.insert(record);
                    }
                }
            }

            Ok(())
        })
    }
}

fn record_for(
    root: &Path,
    path: &Path,
    metadata: &Metadata,
    make: fn(RelativePath, DateTime<Utc>) -> FileRecord,
) -> Option<FileRecord> {
    let relative = match RelativePath::from_host_path(root, path) {
        Ok(p) => p,
        Err(err) => {
            warn!(path = %path.display(), %err, "Skipping entry with unusable path");
            return None;
        }
    };
    match metadata.modified() {
        Ok(mtime) => Some(make(relative, DateTime::<Utc>::from(mtime))),
        Err(err) => {
            warn!(path = %path.display(), %err, "Skipping entry without modification time");
            None
        }
    }
}

/// Hidden or system file per host conventions
///
/// A leading `.` always counts for files; on Windows the HIDDEN and SYSTEM
/// attribute bits count as well.
fn is_hidden(name: &str, metadata: &Metadata) -> bool {
    name.starts_with('.') || has_hidden_attribute(metadata)
}

#[cfg(windows)]
fn has_hidden_attribute(metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
    metadata.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
}

#[cfg(not(windows))]
fn has_hidden_attribute(_metadata: &Metadata) -> bool {
    false
}
