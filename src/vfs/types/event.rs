/*!
 * File Events
 * Change notifications emitted by filesystem backends
 */

/// File system events that can be observed
///
/// Paths are backend-relative and already normalized to forward slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileEvent {
    /// File appeared in the backend
    Created { path: String },

    /// File contents were modified
    Modified { path: String },

    /// File was deleted
    Deleted { path: String },
}

impl FileEvent {
    /// Get the path involved in this event
    pub fn path(&self) -> &str {
        match self {
            FileEvent::Created { path } => path,
            FileEvent::Modified { path } => path,
            FileEvent::Deleted { path } => path,
        }
    }

    pub fn created(path: impl Into<String>) -> Self {
        FileEvent::Created { path: path.into() }
    }

    pub fn modified(path: impl Into<String>) -> Self {
        FileEvent::Modified { path: path.into() }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        FileEvent::Deleted { path: path.into() }
    }
}
