/*!
 * Virtual File System Module
 * Pluggable filesystem backends, mount resolution and change events
 */

pub mod archive;
pub mod local;
pub mod memory;
pub mod mount;
pub mod observable;
pub mod paths;
pub mod traits;
pub mod types;
pub mod watch;

// Re-exports
pub use archive::{ArchiveDiff, ArchiveFS};
pub use local::LocalFS;
pub use memory::MemFS;
pub use mount::{MountId, MountPoint, MountTable, Resolved};
pub use observable::{EventBroadcaster, EventReceiver, ListenerId};
pub use traits::FileSystem;
pub use types::{AssetStream, FileEvent, VfsError, VfsResult};
pub use watch::WatchHandle;
