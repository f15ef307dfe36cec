//! Domain entities and business logic
//!
//! This module contains the core domain types for cloudmirror:
//! - Newtypes for validated local-relative and remote paths
//! - File records and point-in-time snapshots
//! - Sync actions, plans and per-action outcomes
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod plan;
pub mod snapshot;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::{RelativePath, RemotePath};
pub use plan::{ActionEffect, ActionOutcome, ActionResult, SyncAction, SyncPlan};
pub use snapshot::{EntryKind, FileRecord, Snapshot};
