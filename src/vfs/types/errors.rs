/*!
 * VFS Error Types
 * Failures reported by filesystem backends and watchers
 */

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Result of a backend operation
#[must_use = "backend operations can fail and must be handled"]
pub type VfsResult<T> = Result<T, VfsError>;

/// Errors raised by filesystem backends
///
/// Each variant carries a non-empty description of what was being accessed.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum VfsError {
    #[error("Not found: {0}")]
    NotFound(#[serde(deserialize_with = "nonempty")] String),

    #[error("Invalid path: {0}")]
    InvalidPath(#[serde(deserialize_with = "nonempty")] String),

    #[error("I/O error: {0}")]
    IoError(#[serde(deserialize_with = "nonempty")] String),

    /// Malformed or unreadable archive
    #[error("Archive error: {0}")]
    Archive(#[serde(deserialize_with = "nonempty")] String),
}

impl VfsError {
    /// Wrap an io error with what was being accessed; not-found stays distinguishable
    pub fn from_io(e: std::io::Error, context: impl Into<String>) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound(context.into()),
            _ => VfsError::IoError(format!("{}: {}", context.into(), e)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound(_))
    }
}

fn nonempty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        return Err(serde::de::Error::custom("error context must not be empty"));
    }
    Ok(s)
}
