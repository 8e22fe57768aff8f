/*!
 * Mount Table
 * Ordered filesystem mounts and virtual path resolution
 */

use std::sync::Arc;
use tracing::{debug, warn};

use super::paths::{normalize_path, normalize_prefix, strip_prefix};
use super::traits::FileSystem;
use super::types::AssetStream;

/// Stable identifier of one mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountId(pub(crate) u64);

/// Mount point description returned by listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub id: MountId,
    pub prefix: String,
    pub name: String,
    pub hot_reload: bool,
}

/// Internal mount entry with filesystem and options
struct MountEntry {
    id: MountId,
    prefix: String,
    fs: Arc<dyn FileSystem>,
    hot_reload: bool,
}

/// A successful resolution
pub struct Resolved {
    pub stream: AssetStream,
    pub fs: Arc<dyn FileSystem>,
    /// Backend-relative path that was opened
    pub relative: String,
}

/// Mount table for filesystem routing
///
/// Entries are searched most recently mounted first, so later mounts shadow
/// earlier ones at overlapping prefixes.
#[derive(Default)]
pub struct MountTable {
    entries: Vec<MountEntry>,
    next_id: u64,
}

impl MountTable {
    /// Create empty mount table
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a filesystem onto the mount stack
    pub fn mount(&mut self, prefix: &str, fs: Arc<dyn FileSystem>, hot_reload: bool) -> MountPoint {
        self.next_id += 1;
        let entry = MountEntry {
            id: MountId(self.next_id),
            prefix: normalize_prefix(prefix),
            fs,
            hot_reload,
        };
        let point = Self::describe(&entry);
        self.entries.push(entry);
        point
    }

    /// Remove the most recent mount at `prefix`
    pub fn unmount(&mut self, prefix: &str) -> Option<MountPoint> {
        let prefix = normalize_prefix(prefix);
        let index = self.entries.iter().rposition(|e| e.prefix == prefix)?;
        let entry = self.entries.remove(index);
        Some(Self::describe(&entry))
    }

    /// Resolve a virtual path to an open stream
    ///
    /// The first mount that claims the file and opens it wins. A mount whose
    /// `open_read` fails after `exists` returned true is skipped so that
    /// earlier mounts still get a chance.
    pub fn resolve(&self, virtual_path: &str) -> Option<Resolved> {
        let path = normalize_path(virtual_path);

        for entry in self.entries.iter().rev() {
            let Some(relative) = strip_prefix(&path, &entry.prefix) else {
                continue;
            };

            if !entry.fs.exists(relative) {
                continue;
            }

            match entry.fs.open_read(relative) {
                Ok(stream) => {
                    debug!(
                        path = %path,
                        fs = entry.fs.name(),
                        prefix = %entry.prefix,
                        "resolved asset path"
                    );
                    return Some(Resolved {
                        stream,
                        fs: Arc::clone(&entry.fs),
                        relative: relative.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        path = %path,
                        fs = entry.fs.name(),
                        error = %e,
                        "filesystem reported file but failed to open it, trying next mount"
                    );
                }
            }
        }

        None
    }

    /// Check whether any mount claims the path
    pub fn exists(&self, virtual_path: &str) -> bool {
        let path = normalize_path(virtual_path);
        self.entries.iter().rev().any(|entry| {
            strip_prefix(&path, &entry.prefix).is_some_and(|rel| entry.fs.exists(rel))
        })
    }

    /// List mounts, most recent first
    pub fn list(&self) -> Vec<MountPoint> {
        self.entries.iter().rev().map(Self::describe).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn describe(entry: &MountEntry) -> MountPoint {
        MountPoint {
            id: entry.id,
            prefix: entry.prefix.clone(),
            name: entry.fs.name().to_string(),
            hot_reload: entry.hot_reload,
        }
    }
}
