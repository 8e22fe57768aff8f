/*!
 * VFS Types
 * Shared types for filesystem backends
 */

mod errors;
mod event;

pub use errors::{VfsError, VfsResult};
pub use event::FileEvent;

/// Byte stream handed out by `FileSystem::open_read`
pub type AssetStream = Box<dyn std::io::Read + Send>;
