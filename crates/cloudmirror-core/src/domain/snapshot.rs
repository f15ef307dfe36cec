//! File records and snapshots
//!
//! A [`Snapshot`] is a point-in-time mapping of relative path to
//! [`FileRecord`], built fresh on every cycle for either the local tree or
//! the remote folder. Snapshots are never mutated once handed to the
//! planner.

use std::collections::btree_map::{self, BTreeMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RelativePath;

/// Whether a record describes a regular file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
        }
    }
}

/// Metadata for one entry of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the sync root, `/`-separated
    pub path: RelativePath,
    /// Last modification time, full precision
    pub modified_at: DateTime<Utc>,
    /// File or directory
    pub kind: EntryKind,
}

impl FileRecord {
    /// Creates a record for a regular file
    pub fn file(path: RelativePath, modified_at: DateTime<Utc>) -> Self {
        Self {
            path,
            modified_at,
            kind: EntryKind::File,
        }
    }

    /// Creates a record for a directory
    pub fn directory(path: RelativePath, modified_at: DateTime<Utc>) -> Self {
        Self {
            path,
            modified_at,
            kind: EntryKind::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Mapping of relative path to record, one record per path
///
/// Backed by a `BTreeMap` so iteration (and therefore planning) is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<RelativePath, FileRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, replacing any previous record for the same path
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.records.insert(record.path.clone(), record)
    }

    pub fn get(&self, path: &RelativePath) -> Option<&FileRecord> {
        self.records.get(path)
    }

    pub fn contains(&self, path: &RelativePath) -> bool {
        self.records.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in path order
    pub fn iter(&self) -> btree_map::Values<'_, RelativePath, FileRecord> {
        self.records.values()
    }

    pub fn paths(&self) -> btree_map::Keys<'_, RelativePath, FileRecord> {
        self.records.keys()
    }

    /// Returns a copy holding only regular files
    #[must_use]
    pub fn files_only(&self) -> Self {
        self.iter()
            .filter(|r| r.kind == EntryKind::File)
            .cloned()
            .collect()
    }
}

impl FromIterator<FileRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

impl IntoIterator for Snapshot {
    type Item = FileRecord;
    type IntoIter = btree_map::IntoValues<RelativePath, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a FileRecord;
    type IntoIter = btree_map::Values<'a, RelativePath, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}
