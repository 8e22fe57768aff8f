/*!
 * Hot Reload
 * Turns filesystem change notifications into cache evictions
 */

use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use super::manager::ManagerInner;
use super::pending::LoadState;
use crate::vfs::paths::join;
use crate::vfs::{FileEvent, FileSystem, ListenerId};

/// Listener attached to one hot-reload mount; detaches on drop
pub(crate) struct Subscription {
    fs: Arc<dyn FileSystem>,
    listener: ListenerId,
}

impl Subscription {
    /// Listen to `fs` on behalf of the mount at `prefix`
    ///
    /// Returns None when the filesystem does not emit events.
    pub(crate) fn attach(
        manager: &Arc<ManagerInner>,
        prefix: &str,
        fs: Arc<dyn FileSystem>,
    ) -> Option<Self> {
        let events = fs.events()?;
        let manager = Arc::downgrade(manager);
        let prefix = prefix.to_string();

        let listener = events.listen(move |event| on_event(&manager, &prefix, event));

        Some(Self { fs, listener })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(events) = self.fs.events() {
            events.unlisten(self.listener);
        }
    }
}

/// Runs on the thread that emitted the event
fn on_event(manager: &Weak<ManagerInner>, prefix: &str, event: &FileEvent) {
    let Some(manager) = manager.upgrade() else {
        return;
    };
    let path = join(prefix, event.path());

    match event {
        FileEvent::Modified { .. } => {
            if manager.state(&path) == LoadState::Unloaded {
                return;
            }
            // Blocks until an in-flight load finishes, so the next request
            // always publishes a fresh load
            if manager.unload(&path) {
                manager.record_hot_reload();
                info!(path = %path, "asset changed, evicted from cache");
            }
        }
        FileEvent::Deleted { .. } => {
            if manager.state(&path) != LoadState::Unloaded {
                warn!(path = %path, "cached asset was deleted from its filesystem");
            }
        }
        FileEvent::Created { .. } => {
            debug!(path = %path, "asset created");
        }
    }
}
