/*!
 * Archive Filesystem Backend
 * Read-only zip-backed filesystem that diffs itself when the archive changes
 */

use ahash::RandomState;
use arc_swap::ArcSwap;
use notify::RecursiveMode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{error, info};
use zip::ZipArchive;

use super::observable::{EventBroadcaster, DEFAULT_EVENT_CAPACITY};
use super::paths::normalize_path;
use super::traits::FileSystem;
use super::types::*;
use super::watch::{start_watcher, ChangeKind, WatchHandle};
use crate::core::config::AssetConfig;

/// Location of one file inside the archive
#[derive(Debug, Clone, Copy)]
struct ArchiveEntry {
    index: usize,
    size: u64,
}

/// Archive handle and entry table, always swapped together
struct ArchiveSnapshot {
    archive: Mutex<ZipArchive<File>>,
    entries: HashMap<String, ArchiveEntry, RandomState>,
}

impl ArchiveSnapshot {
    fn open(path: &Path) -> VfsResult<Self> {
        let file = File::open(path)
            .map_err(|e| VfsError::from_io(e, format!("open archive {}", path.display())))?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| VfsError::Archive(format!("{}: {}", path.display(), e)))?;

        let mut entries = HashMap::with_capacity_and_hasher(archive.len(), RandomState::new());
        for index in 0..archive.len() {
            let file = archive
                .by_index(index)
                .map_err(|e| VfsError::Archive(format!("{} entry {}: {}", path.display(), index, e)))?;
            if file.is_dir() {
                continue;
            }
            entries.insert(
                normalize_path(file.name()),
                ArchiveEntry {
                    index,
                    size: file.size(),
                },
            );
        }

        Ok(Self {
            archive: Mutex::new(archive),
            entries,
        })
    }
}

/// Outcome of re-reading the archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveDiff {
    /// Entries present before and after; each got a `Modified` event
    pub changed: Vec<String>,
    /// Entries that disappeared; each got a `Deleted` event
    pub deleted: Vec<String>,
    /// Entries that appeared; no event is emitted for these
    pub added: Vec<String>,
}

/// Zip archive filesystem
///
/// Not thread-safe: all reads go through one archive handle, so the asset
/// manager drains streams on the requesting thread.
pub struct ArchiveFS {
    path: PathBuf,
    name: String,
    current: ArcSwap<ArchiveSnapshot>,
    events: EventBroadcaster,
    reload_lock: Mutex<()>,
}

impl ArchiveFS {
    /// Open an archive from disk
    pub fn open<P: Into<PathBuf>>(path: P) -> VfsResult<Self> {
        Self::open_with_event_capacity(path, DEFAULT_EVENT_CAPACITY)
    }

    /// Open an archive whose event channel is sized by `config.event_capacity`
    pub fn open_with_config<P: Into<PathBuf>>(path: P, config: &AssetConfig) -> VfsResult<Self> {
        Self::open_with_event_capacity(path, config.event_capacity)
    }

    pub fn open_with_event_capacity<P: Into<PathBuf>>(path: P, capacity: usize) -> VfsResult<Self> {
        let path = path.into();
        let snapshot = ArchiveSnapshot::open(&path)?;
        info!(
            path = %path.display(),
            entries = snapshot.entries.len(),
            "archive opened"
        );

        Ok(Self {
            name: format!("archive:{}", path.display()),
            path,
            current: ArcSwap::from_pointee(snapshot),
            events: EventBroadcaster::new(capacity),
            reload_lock: Mutex::new(()),
        })
    }

    pub fn archive_path(&self) -> &Path {
        &self.path
    }

    /// Names of all file entries, sorted
    pub fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.current.load().entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Re-read the archive after it changed on disk
    ///
    /// Entries that survived get `Modified`, entries that vanished get
    /// `Deleted`; new entries get no event and are only reported in the diff.
    ///
    /// The new entry table is swapped in before any event is emitted. A
    /// listener that evicts and immediately reloads therefore reads the new
    /// archive; emitting first would let that reload cache the old contents.
    pub fn reload(&self) -> VfsResult<ArchiveDiff> {
        let _guard = self.reload_lock.lock();

        let fresh = ArchiveSnapshot::open(&self.path)?;
        let previous = self.current.load_full();

        let mut diff = ArchiveDiff::default();
        for name in previous.entries.keys() {
            if fresh.entries.contains_key(name) {
                diff.changed.push(name.clone());
            } else {
                diff.deleted.push(name.clone());
            }
        }
        for name in fresh.entries.keys() {
            if !previous.entries.contains_key(name) {
                diff.added.push(name.clone());
            }
        }
        diff.changed.sort();
        diff.deleted.sort();
        diff.added.sort();

        self.current.store(Arc::new(fresh));

        info!(
            path = %self.path.display(),
            changed = diff.changed.len(),
            deleted = diff.deleted.len(),
            added = diff.added.len(),
            "archive reloaded"
        );

        for name in &diff.changed {
            self.events.emit(FileEvent::modified(name.clone()));
        }
        for name in &diff.deleted {
            self.events.emit(FileEvent::deleted(name.clone()));
        }

        Ok(diff)
    }

    /// Watch the archive file and reload whenever it changes
    ///
    /// Every notification triggers a reload; a reload that sees a half-written
    /// archive fails, keeps the old table and waits for the next event. The
    /// watcher holds only a weak reference to the filesystem.
    pub fn watch(self: &Arc<Self>, config: &AssetConfig) -> VfsResult<WatchHandle> {
        // Watch the directory: editors and build tools often replace the file
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| VfsError::InvalidPath(self.path.display().to_string()))?;

        let weak: Weak<Self> = Arc::downgrade(self);

        start_watcher(&dir, RecursiveMode::NonRecursive, config, move |event| {
            match ChangeKind::from_event_kind(&event.kind) {
                Some(ChangeKind::Created) | Some(ChangeKind::Modified) => {}
                _ => return,
            }

            let touches_archive = event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()));
            if !touches_archive {
                return;
            }

            let Some(fs) = weak.upgrade() else {
                return;
            };
            if let Err(e) = fs.reload() {
                error!(path = %fs.path.display(), error = %e, "archive reload failed");
            }
        })
    }
}

impl FileSystem for ArchiveFS {
    fn exists(&self, path: &str) -> bool {
        self.current.load().entries.contains_key(&normalize_path(path))
    }

    fn open_read(&self, path: &str) -> VfsResult<AssetStream> {
        let path = normalize_path(path);
        let snapshot = self.current.load_full();
        let entry = *snapshot
            .entries
            .get(&path)
            .ok_or_else(|| VfsError::NotFound(path.clone()))?;

        let mut archive = snapshot.archive.lock();
        let mut file = archive
            .by_index(entry.index)
            .map_err(|e| VfsError::Archive(format!("{}: {}", path, e)))?;

        let mut data = Vec::with_capacity(entry.size as usize);
        file.read_to_end(&mut data)
            .map_err(|e| VfsError::from_io(e, format!("read {}", path)))?;

        Ok(Box::new(Cursor::new(data)))
    }

    fn is_thread_safe(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> Option<&EventBroadcaster> {
        Some(&self.events)
    }
}

impl std::fmt::Debug for ArchiveFS {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFS")
            .field("path", &self.path)
            .field("entries", &self.current.load().entries.len())
            .finish()
    }
}
