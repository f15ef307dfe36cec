//! cloudmirror Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `FileRecord`, `Snapshot`, `SyncAction`, `SyncPlan`, `ActionOutcome`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ISyncReporter`
//! - **Configuration** - Typed YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`cloudmirror-disk` for the remote store, `cloudmirror-sync` for the
//! tracing reporter). The sync crate orchestrates domain values through
//! those ports.

pub mod config;
pub mod domain;
pub mod ports;
