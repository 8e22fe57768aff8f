/*!
 * VFS Traits
 * Minimal capability contract every backend implements
 */

use super::observable::EventBroadcaster;
use super::types::{AssetStream, VfsResult};

/// Virtual filesystem trait
///
/// Paths are backend-relative: forward slashes, no leading `/`.
pub trait FileSystem: Send + Sync {
    /// Check if a file exists
    fn exists(&self, path: &str) -> bool;

    /// Open a file for reading
    ///
    /// Fails with `VfsError::NotFound` if the file does not exist.
    fn open_read(&self, path: &str) -> VfsResult<AssetStream>;

    /// Whether streams from this backend may be consumed on another thread
    /// while the backend is used concurrently
    fn is_thread_safe(&self) -> bool {
        true
    }

    /// Get filesystem name/type
    fn name(&self) -> &str;

    /// Change and delete notifications, if the backend produces any
    fn events(&self) -> Option<&EventBroadcaster> {
        None
    }
}
