//! Snapshot diffing
//!
//! Pure: no I/O, no clock. Given the same snapshots the same plan comes out,
//! with uploads and overwrites in local path order followed by deletes in
//! remote path order.

use cloudmirror_core::domain::{Snapshot, SyncAction, SyncPlan};

/// Computes the actions that make `remote` match `local`
///
/// - local only: `Upload`
/// - both, timestamps differ (or one side is a directory and the other a
///   file): `Overwrite`
/// - both, identical: nothing
/// - remote only: `Delete`
///
/// Timestamps are compared for exact equality.
pub fn plan(local: &Snapshot, remote: &Snapshot) -> SyncPlan {
    let mut plan = SyncPlan::new();

    for record in local {
        match remote.get(&record.path) {
            None => {
                plan.push(SyncAction::Upload(record.clone()));
            }
            Some(existing)
                if existing.modified_at == record.modified_at && existing.kind == record.kind => {}
            Some(_) => {
                plan.push(SyncAction::Overwrite(record.clone()));
            }
        }
    }

    for record in remote {
        if !local.contains(&record.path) {
            plan.push(SyncAction::Delete(record.clone()));
        }
    }

    plan
}
