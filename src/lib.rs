/*!
 * Asset VFS Library
 * Virtual filesystem mounts, typed asset loading and hot reload
 */

pub mod assets;
pub mod core;
pub mod monitoring;
pub mod vfs;

// Re-exports
pub use assets::{
    Asset, AssetHandle, AssetLoader, AssetManager, BoxError, CacheStats, LoadState, Releasable,
};
pub use crate::core::{AssetConfig, AssetError, AssetResult};
pub use monitoring::init_tracing;
pub use vfs::{
    ArchiveDiff, ArchiveFS, AssetStream, EventReceiver, FileEvent, FileSystem, LocalFS, MemFS,
    MountPoint, VfsError, VfsResult, WatchHandle,
};
