//! Keyed async locks
//!
//! One `tokio::sync::Mutex` per remote directory path, created on first use.
//! Two uploads racing to create `/Backup/sub` queue on the same lock; work
//! under unrelated paths never waits.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Lock map keyed by directory path
#[derive(Debug, Default)]
pub struct DirectoryLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DirectoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the DashMap shard is not held across the await.
        let mutex = Arc::clone(
            self.locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        trace!(key, "Waiting for directory lock");
        mutex.lock_owned().await
    }

    /// Number of distinct keys seen so far
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
