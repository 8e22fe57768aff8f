/*!
 * Local Filesystem Backend
 * Folder-backed filesystem wrapping std::fs with optional watching
 */

use notify::RecursiveMode;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::observable::{EventBroadcaster, DEFAULT_EVENT_CAPACITY};
use super::paths::normalize_path;
use super::traits::FileSystem;
use super::types::*;
use super::watch::{start_watcher, ChangeKind, Debouncer, WatchHandle};
use crate::core::config::AssetConfig;

/// Local filesystem implementation rooted at a host directory
#[derive(Debug, Clone)]
pub struct LocalFS {
    root: PathBuf,
    name: String,
    events: EventBroadcaster,
}

impl LocalFS {
    /// Create new local filesystem rooted at specified path
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::with_event_capacity(root, DEFAULT_EVENT_CAPACITY)
    }

    /// Backend sized by `config.event_capacity`
    pub fn with_config<P: Into<PathBuf>>(root: P, config: &AssetConfig) -> Self {
        Self::with_event_capacity(root, config.event_capacity)
    }

    pub fn with_event_capacity<P: Into<PathBuf>>(root: P, capacity: usize) -> Self {
        let root = root.into();
        Self {
            name: format!("local:{}", root.display()),
            root,
            events: EventBroadcaster::new(capacity),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve path relative to root with proper normalization
    /// Prevents directory traversal by manual component processing
    fn resolve(&self, path: &str) -> PathBuf {
        let mut result = self.root.clone();
        for segment in normalize_path(path).split('/') {
            if !segment.is_empty() {
                result.push(segment);
            }
        }
        result
    }

    /// Map a host path back to a backend-relative path
    fn relative_to(root: &Path, host: &Path) -> Option<String> {
        let rel = host.strip_prefix(root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// Report an external modification of `path`
    pub fn notify_changed(&self, path: &str) {
        self.events.emit(FileEvent::modified(normalize_path(path)));
    }

    /// Report an external deletion of `path`
    pub fn notify_deleted(&self, path: &str) {
        self.events.emit(FileEvent::deleted(normalize_path(path)));
    }

    /// Watch the root directory and turn host notifications into events
    ///
    /// Bursts for one file are coalesced: its event is emitted once the file
    /// has been quiet for `watch_debounce`, so the last write always gets
    /// through. Dropping the handle stops watching.
    pub fn watch(&self, config: &AssetConfig) -> VfsResult<WatchHandle> {
        fs::create_dir_all(&self.root)
            .map_err(|e| VfsError::from_io(e, format!("create root {}", self.root.display())))?;

        // Host notifications usually carry canonical paths
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let raw_root = self.root.clone();
        let events = self.events.clone();
        let debouncer = Debouncer::spawn(config.watch_debounce, move |rel, kind| {
            debug!(path = %rel, kind = ?kind, "local file change");
            events.emit(match kind {
                ChangeKind::Created => FileEvent::created(rel),
                ChangeKind::Modified => FileEvent::modified(rel),
                ChangeKind::Deleted => FileEvent::deleted(rel),
            });
        })?;

        start_watcher(&self.root, RecursiveMode::Recursive, config, move |event| {
            let Some(kind) = ChangeKind::from_event_kind(&event.kind) else {
                return;
            };

            for host_path in &event.paths {
                if kind != ChangeKind::Deleted && host_path.is_dir() {
                    continue;
                }

                let Some(rel) = Self::relative_to(&root, host_path)
                    .or_else(|| Self::relative_to(&raw_root, host_path))
                else {
                    continue;
                };

                debouncer.push(rel, kind);
            }
        })
    }
}

impl FileSystem for LocalFS {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn open_read(&self, path: &str) -> VfsResult<AssetStream> {
        let full_path = self.resolve(path);
        let file = File::open(&full_path)
            .map_err(|e| VfsError::from_io(e, format!("open {}", path)))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> Option<&EventBroadcaster> {
        Some(&self.events)
    }
}
