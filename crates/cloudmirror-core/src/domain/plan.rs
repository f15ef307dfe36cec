//! Sync actions, plans and outcomes
//!
//! A [`SyncPlan`] is the output of diffing a local and a remote
//! [`Snapshot`](super::snapshot::Snapshot). Executing it yields one
//! [`ActionOutcome`] per action. Nothing here is persisted across cycles;
//! the remote store is the only source of truth for what is already synced.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::newtypes::RelativePath;
use super::snapshot::{EntryKind, FileRecord};

// ============================================================================
// SyncAction
// ============================================================================

/// A single mutation of the remote store
///
/// `Upload` and `Overwrite` carry the local record (the remote side must end
/// up with its timestamp); `Delete` carries the remote record being removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "record", rename_all = "snake_case")]
pub enum SyncAction {
    /// Path exists locally but not remotely
    Upload(FileRecord),
    /// Path exists on both sides with differing timestamps
    Overwrite(FileRecord),
    /// Path exists remotely but not locally
    Delete(FileRecord),
}

impl SyncAction {
    pub fn record(&self) -> &FileRecord {
        match self {
            SyncAction::Upload(r) | SyncAction::Overwrite(r) | SyncAction::Delete(r) => r,
        }
    }

    pub fn path(&self) -> &RelativePath {
        &self.record().path
    }

    pub fn kind(&self) -> EntryKind {
        self.record().kind
    }

    /// Short lowercase name used in log lines
    pub fn verb(&self) -> &'static str {
        match self {
            SyncAction::Upload(_) => "upload",
            SyncAction::Overwrite(_) => "overwrite",
            SyncAction::Delete(_) => "delete",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}'", self.verb(), self.kind(), self.path())
    }
}

// ============================================================================
// SyncPlan
// ============================================================================

/// The full set of actions for one cycle
///
/// Built only through [`SyncPlan::push`], which refuses a second action for
/// a path that already has one, so no two actions ever conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    actions: Vec<SyncAction>,
    planned: BTreeSet<RelativePath>,
}

impl SyncPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action
    ///
    /// Returns `false` (and drops the action) if the path is already planned.
    pub fn push(&mut self, action: SyncAction) -> bool {
        if !self.planned.insert(action.path().clone()) {
            return false;
        }
        self.actions.push(action);
        true
    }

    pub fn actions(&self) -> &[SyncAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Finds the action planned for a path
    pub fn action_for(&self, path: &RelativePath) -> Option<&SyncAction> {
        self.actions.iter().find(|a| a.path() == path)
    }

    pub fn uploads(&self) -> usize {
        self.count(|a| matches!(a, SyncAction::Upload(_)))
    }

    pub fn overwrites(&self) -> usize {
        self.count(|a| matches!(a, SyncAction::Overwrite(_)))
    }

    pub fn deletes(&self) -> usize {
        self.count(|a| matches!(a, SyncAction::Delete(_)))
    }

    fn count(&self, pred: impl Fn(&SyncAction) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(a)).count()
    }
}

impl IntoIterator for SyncPlan {
    type Item = SyncAction;
    type IntoIter = std::vec::IntoIter<SyncAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

// ============================================================================
// ActionOutcome
// ============================================================================

/// What a successful action actually did on the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionEffect {
    /// A new object was written
    Uploaded,
    /// An existing object was replaced
    Overwritten,
    /// The object already existed and overwrite was not requested
    Skipped,
    /// The object was removed
    Deleted,
    /// The object was already gone
    AlreadyAbsent,
    /// A directory record was materialized remotely
    DirectoryEnsured,
}

impl fmt::Display for ActionEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionEffect::Uploaded => "uploaded",
            ActionEffect::Overwritten => "overwritten",
            ActionEffect::Skipped => "skipped",
            ActionEffect::Deleted => "deleted",
            ActionEffect::AlreadyAbsent => "already absent",
            ActionEffect::DirectoryEnsured => "directory ensured",
        };
        write!(f, "{s}")
    }
}

/// Success or failure of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    Success(ActionEffect),
    Failure { cause: String },
}

/// The result of executing one [`SyncAction`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: SyncAction,
    pub result: ActionResult,
}

impl ActionOutcome {
    pub fn success(action: SyncAction, effect: ActionEffect) -> Self {
        Self {
            action,
            result: ActionResult::Success(effect),
        }
    }

    pub fn failure(action: SyncAction, cause: impl Into<String>) -> Self {
        Self {
            action,
            result: ActionResult::Failure {
                cause: cause.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, ActionResult::Success(_))
    }

    /// The effect, if the action succeeded
    pub fn effect(&self) -> Option<ActionEffect> {
        match self.result {
            ActionResult::Success(effect) => Some(effect),
            ActionResult::Failure { .. } => None,
        }
    }

    /// The failure cause, if the action failed
    pub fn cause(&self) -> Option<&str> {
        match &self.result {
            ActionResult::Success(_) => None,
            ActionResult::Failure { cause } => Some(cause),
        }
    }
}
