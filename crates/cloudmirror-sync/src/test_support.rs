//! In-memory remote store for executor and driver tests

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cloudmirror_core::domain::{EntryKind, FileRecord, RemotePath, Snapshot};
use cloudmirror_core::ports::{DeleteOutcome, IRemoteStore, PutOutcome};

#[derive(Debug, Clone)]
struct StoredObject {
    kind: EntryKind,
    modified_at: DateTime<Utc>,
    bytes: Vec<u8>,
}

/// Remote store keeping objects in a map keyed by absolute remote path
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    fail_paths: Mutex<HashSet<String>>,
    panic_paths: Mutex<HashSet<String>>,
    list_unavailable: AtomicBool,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn seed_file(&self, path: &str, modified_at: DateTime<Utc>, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(
            path.to_string(),
            StoredObject {
                kind: EntryKind::File,
                modified_at,
                bytes: bytes.to_vec(),
            },
        );
    }

    pub(crate) fn fail_on(&self, path: &str) {
        self.fail_paths.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn clear_failures(&self) {
        self.fail_paths.lock().unwrap().clear();
    }

    pub(crate) fn panic_on(&self, path: &str) {
        self.panic_paths.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn set_list_unavailable(&self, unavailable: bool) {
        self.list_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    pub(crate) fn is_directory(&self, path: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .is_some_and(|o| o.kind == EntryKind::Directory)
    }

    pub(crate) fn modified_at(&self, path: &str) -> Option<DateTime<Utc>> {
        self.objects.lock().unwrap().get(path).map(|o| o.modified_at)
    }

    pub(crate) fn bytes(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).map(|o| o.bytes.clone())
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check_injected(&self, path: &RemotePath) -> anyhow::Result<()> {
        if self.panic_paths.lock().unwrap().contains(path.as_str()) {
            panic!("injected panic for {path}");
        }
        if self.fail_paths.lock().unwrap().contains(path.as_str()) {
            anyhow::bail!("injected failure for {path}");
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn create_directories(&self, path: &RemotePath) {
        let mut objects = self.objects.lock().unwrap();
        for dir in path.ancestors() {
            objects
                .entry(dir.as_str().to_string())
                .or_insert_with(|| StoredObject {
                    kind: EntryKind::Directory,
                    modified_at: Utc::now(),
                    bytes: Vec::new(),
                });
        }
    }
}

#[async_trait::async_trait]
impl IRemoteStore for MemoryStore {
    async fn list(&self, root: &RemotePath) -> Snapshot {
        if self.list_unavailable.load(Ordering::SeqCst) {
            return Snapshot::new();
        }
        let objects = self.objects.lock().unwrap();
        objects
            .iter()
            .filter_map(|(path, object)| {
                let relative = root.relative_of(path)?;
                Some(match object.kind {
                    EntryKind::File => FileRecord::file(relative, object.modified_at),
                    EntryKind::Directory => FileRecord::directory(relative, object.modified_at),
                })
            })
            .collect()
    }

    async fn ensure_directory(&self, path: &RemotePath) -> anyhow::Result<()> {
        self.check_injected(path)?;
        self.create_directories(path);
        Ok(())
    }

    async fn put(
        &self,
        remote_path: &RemotePath,
        local_file: &Path,
        modified_at: DateTime<Utc>,
        overwrite: bool,
    ) -> anyhow::Result<PutOutcome> {
        self.check_injected(remote_path)?;
        if let Some(parent) = remote_path.parent() {
            if !parent.is_root() {
                self.create_directories(&parent);
            }
        }
        if !overwrite && self.contains(remote_path.as_str()) {
            return Ok(PutOutcome::Skipped);
        }

        self.simulate_latency().await;
        let bytes = tokio::fs::read(local_file).await?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().insert(
            remote_path.as_str().to_string(),
            StoredObject {
                kind: EntryKind::File,
                modified_at,
                bytes,
            },
        );
        Ok(PutOutcome::Uploaded)
    }

    async fn set_modified(
        &self,
        remote_path: &RemotePath,
        modified_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.check_injected(remote_path)?;
        match self.objects.lock().unwrap().get_mut(remote_path.as_str()) {
            Some(object) => {
                object.modified_at = modified_at;
                Ok(())
            }
            None => anyhow::bail!("no object at {remote_path}"),
        }
    }

    async fn delete(&self, remote_path: &RemotePath) -> anyhow::Result<DeleteOutcome> {
        self.check_injected(remote_path)?;
        let mut objects = self.objects.lock().unwrap();
        if objects.remove(remote_path.as_str()).is_none() {
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        let prefix = format!("{}/", remote_path.as_str());
        objects.retain(|path, _| !path.starts_with(&prefix));
        Ok(DeleteOutcome::Deleted)
    }
}
