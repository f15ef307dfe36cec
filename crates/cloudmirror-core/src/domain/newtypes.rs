//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the two path flavours
//! the sync engine deals with. Each newtype ensures validity at construction
//! time so the planner and executor never see malformed paths.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// RelativePath
// ============================================================================

/// A path relative to the sync root, always `/`-separated
///
/// RelativePath ensures the path is:
/// - Non-empty, without leading or trailing `/`
/// - Free of empty, `.` and `..` segments
/// - Separated by `/` regardless of the host OS
///
/// It is the key used by both local and remote snapshots, so the same file
/// produces byte-identical keys on both sides.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Create a new RelativePath
    ///
    /// Only `/` separates segments. A backslash is an ordinary filename
    /// character here; host separators are split by [`Self::from_host_path`].
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRelativePath` on empty, absolute or
    /// traversing input
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();

        if path.is_empty() {
            return Err(DomainError::InvalidRelativePath(
                "Relative path must not be empty".to_string(),
            ));
        }

        if path.starts_with('/') || path.ends_with('/') {
            return Err(DomainError::InvalidRelativePath(format!(
                "Relative path must not start or end with '/': {path}"
            )));
        }

        for segment in path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(DomainError::InvalidRelativePath(format!(
                    "Relative path contains an invalid segment: {path}"
                )));
            }
        }

        Ok(Self(path))
    }

    /// Build a RelativePath from a host path located under `root`
    ///
    /// # Errors
    /// Returns `DomainError::PathNotInSyncRoot` if `path` is not below
    /// `root`, or `InvalidRelativePath` for non-UTF-8 components
    pub fn from_host_path(root: &Path, path: &Path) -> Result<Self, DomainError> {
        let relative = path.strip_prefix(root).map_err(|_| {
            DomainError::PathNotInSyncRoot(format!(
                "{} is not within {}",
                path.display(),
                root.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| {
                        DomainError::InvalidRelativePath(format!(
                            "Non UTF-8 path component in {}",
                            path.display()
                        ))
                    })?;
                    segments.push(part);
                }
                Component::CurDir => {}
                _ => {
                    return Err(DomainError::InvalidRelativePath(format!(
                        "Unexpected component in {}",
                        relative.display()
                    )))
                }
            }
        }

        Self::new(segments.join("/"))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent directory, or `None` for a top-level entry
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Last path segment
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Resolve this path against a local root directory
    #[must_use]
    pub fn to_host_path(&self, root: &Path) -> std::path::PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RelativePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

// ============================================================================
// RemotePath
// ============================================================================

/// An absolute path in the remote store (must start with /)
///
/// Represents paths such as "/Backup/docs/file.txt". The store adapter is
/// responsible for mapping this onto whatever prefix its API expects.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new RemotePath
    ///
    /// # Errors
    /// Returns error if path doesn't start with /
    pub fn new(path: String) -> Result<Self, DomainError> {
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must start with '/': {path}"
            )));
        }

        // Validate no double slashes (except root)
        if path.len() > 1 && path.contains("//") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid double slashes: {path}"
            )));
        }

        if path.len() > 1 && path.ends_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must not end with '/': {path}"
            )));
        }

        if path.split('/').any(|s| s == "..") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid traversal: {path}"
            )));
        }

        Ok(Self(path))
    }

    /// Build the remote root for a configured cloud folder name
    ///
    /// Accepts `"Backup"`, `"/Backup"` or `"disk:/Backup"`.
    ///
    /// # Errors
    /// Returns error if the resulting path is invalid
    pub fn from_folder_name(name: &str) -> Result<Self, DomainError> {
        let trimmed = name
            .trim()
            .trim_start_matches("disk:")
            .trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        Self::new(format!("/{trimmed}"))
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for "/"
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Append a relative path below this one
    #[must_use]
    pub fn join_relative(&self, relative: &RelativePath) -> Self {
        if self.is_root() {
            Self(format!("/{}", relative.as_str()))
        } else {
            Self(format!("{}/{}", self.0, relative.as_str()))
        }
    }

    /// Strip this path from `other`, yielding the relative remainder
    ///
    /// Returns `None` when `other` is this path or lies outside it.
    #[must_use]
    pub fn relative_of(&self, other: &str) -> Option<RelativePath> {
        let rest = if self.is_root() {
            other.strip_prefix('/')?
        } else {
            other.strip_prefix(self.0.as_str())?.strip_prefix('/')?
        };
        RelativePath::new(rest).ok()
    }

    /// Get the parent path
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0 == "/" {
            return None;
        }

        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Get the file name component
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.0 == "/" {
            return None;
        }

        self.0.rsplit('/').next()
    }

    /// Every prefix of this path from the top-level segment down to the
    /// path itself, excluding "/"
    ///
    /// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        let mut out = Vec::new();
        let mut current = String::new();
        for segment in self.0.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            out.push(Self(current.clone()));
        }
        out
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}
