//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Remote object-store operations (list, put, delete, mkdir)
//! - [`ISyncReporter`] - Sink for cycle and per-action events

pub mod remote_store;
pub mod reporter;

pub use remote_store::{DeleteOutcome, IRemoteStore, PutOutcome};
pub use reporter::{CycleSummary, ISyncReporter};
