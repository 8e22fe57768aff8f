/*!
 * In-Memory Filesystem Backend
 * Fast, volatile filesystem for testing and generated content
 */

use ahash::RandomState;
use dashmap::DashMap;
use std::io::Cursor;
use std::sync::Arc;

use super::observable::{EventBroadcaster, DEFAULT_EVENT_CAPACITY};
use super::paths::normalize_path;
use super::traits::FileSystem;
use super::types::*;
use crate::core::config::AssetConfig;

/// In-memory filesystem implementation
///
/// Writes and removals emit `Created`/`Modified`/`Deleted` events.
#[derive(Debug, Clone)]
pub struct MemFS {
    files: Arc<DashMap<String, Arc<[u8]>, RandomState>>,
    events: EventBroadcaster,
    thread_safe: bool,
}

impl MemFS {
    /// Create new in-memory filesystem
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Backend sized by `config.event_capacity`
    pub fn with_config(config: &AssetConfig) -> Self {
        Self::with_event_capacity(config.event_capacity)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            files: Arc::new(DashMap::with_hasher(RandomState::new())),
            events: EventBroadcaster::new(capacity),
            thread_safe: true,
        }
    }

    /// Filesystem that reports itself as not thread-safe, so loads against
    /// it are buffered on the requesting thread
    pub fn single_threaded() -> Self {
        Self {
            thread_safe: false,
            ..Self::new()
        }
    }

    /// Create or replace a file and notify listeners
    pub fn write(&self, path: &str, data: &[u8]) {
        let path = normalize_path(path);
        let existed = self
            .files
            .insert(path.clone(), Arc::from(data))
            .is_some();

        if existed {
            self.events.emit(FileEvent::Modified { path });
        } else {
            self.events.emit(FileEvent::Created { path });
        }
    }

    /// Delete a file and notify listeners
    pub fn remove(&self, path: &str) -> VfsResult<()> {
        let path = normalize_path(path);
        if self.files.remove(&path).is_none() {
            return Err(VfsError::NotFound(path));
        }
        self.events.emit(FileEvent::Deleted { path });
        Ok(())
    }

    /// Current contents of a file
    pub fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        let path = normalize_path(path);
        self.files
            .get(&path)
            .map(|data| data.to_vec())
            .ok_or(VfsError::NotFound(path))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for MemFS {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemFS {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn open_read(&self, path: &str) -> VfsResult<AssetStream> {
        let path = normalize_path(path);
        let data = self
            .files
            .get(&path)
            .map(|data| Arc::clone(data.value()))
            .ok_or(VfsError::NotFound(path))?;

        Ok(Box::new(Cursor::new(data)))
    }

    fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    fn name(&self) -> &str {
        "memfs"
    }

    fn events(&self) -> Option<&EventBroadcaster> {
        Some(&self.events)
    }
}
