/*!
 * Filesystem Watching
 * Bridges host file notifications (notify) into backend events
 */

use ahash::RandomState;
use flume::RecvTimeoutError;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::types::{VfsError, VfsResult};
use crate::core::config::AssetConfig;

/// Kind of change a host notification maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Map a notify event kind; access and metadata-only events are ignored
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Deleted),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

/// Keeps a watcher alive; dropping it stops the notifications
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    target: String,
}

impl WatchHandle {
    /// Path being watched
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        info!(path = %self.target, "filesystem watcher stopped");
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("target", &self.target)
            .finish()
    }
}

/// Coalesces bursts of events per path and delivers the last one
///
/// An event is delivered once its path has been quiet for the window, so the
/// final write of a burst always produces a notification. Delivery happens
/// on a dedicated thread that exits after the debouncer is dropped and the
/// remaining events are flushed.
pub(crate) struct Debouncer {
    sender: Option<flume::Sender<(String, ChangeKind)>>,
    window: Duration,
    emit: Arc<dyn Fn(&str, ChangeKind) + Send + Sync>,
}

impl Debouncer {
    pub(crate) fn spawn<F>(window: Duration, emit: F) -> VfsResult<Self>
    where
        F: Fn(&str, ChangeKind) + Send + Sync + 'static,
    {
        let emit: Arc<dyn Fn(&str, ChangeKind) + Send + Sync> = Arc::new(emit);
        if window.is_zero() {
            return Ok(Self {
                sender: None,
                window,
                emit,
            });
        }

        let (sender, receiver) = flume::unbounded();
        let deliver = Arc::clone(&emit);
        thread::Builder::new()
            .name("asset-watch-debounce".into())
            .spawn(move || coalesce(receiver, window, deliver.as_ref()))
            .map_err(|e| VfsError::IoError(format!("spawn debounce thread: {}", e)))?;

        Ok(Self {
            sender: Some(sender),
            window,
            emit,
        })
    }

    pub(crate) fn window(&self) -> Duration {
        self.window
    }

    /// Queue an event; without a window it is delivered immediately
    pub(crate) fn push(&self, path: String, kind: ChangeKind) {
        let rejected = match &self.sender {
            Some(sender) => sender.send((path, kind)).err().map(|e| e.into_inner()),
            None => Some((path, kind)),
        };
        if let Some((path, kind)) = rejected {
            (self.emit)(&path, kind);
        }
    }
}

/// Later events replace earlier ones, except that a file created and then
/// written stays created and a file deleted and recreated counts as modified
fn merge(previous: ChangeKind, next: ChangeKind) -> ChangeKind {
    match (previous, next) {
        (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
        (ChangeKind::Deleted, ChangeKind::Created) => ChangeKind::Modified,
        (_, next) => next,
    }
}

fn coalesce(
    receiver: flume::Receiver<(String, ChangeKind)>,
    window: Duration,
    emit: &(dyn Fn(&str, ChangeKind) + Send + Sync),
) {
    let mut pending: HashMap<String, (ChangeKind, Instant), RandomState> = HashMap::default();

    loop {
        let next_due = pending.values().map(|(_, due)| *due).min();
        let received = match next_due {
            Some(due) => receiver.recv_deadline(due),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok((path, kind)) => {
                let due = Instant::now() + window;
                pending
                    .entry(path)
                    .and_modify(|entry| *entry = (merge(entry.0, kind), due))
                    .or_insert((kind, due));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                for (path, (kind, _)) in pending.drain() {
                    emit(&path, kind);
                }
                return;
            }
        }

        let now = Instant::now();
        let ready: Vec<String> = pending
            .iter()
            .filter(|(_, (_, due))| *due <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in ready {
            if let Some((kind, _)) = pending.remove(&path) {
                emit(&path, kind);
            }
        }
    }
}

/// Start a host watcher on `target`, feeding every relevant event to `handler`
///
/// The handler runs on the watcher's notification thread.
pub(crate) fn start_watcher<F>(
    target: &Path,
    mode: RecursiveMode,
    config: &AssetConfig,
    mut handler: F,
) -> VfsResult<WatchHandle>
where
    F: FnMut(Event) + Send + 'static,
{
    let target_display = target.display().to_string();
    let error_target = target_display.clone();

    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| match result {
            Ok(event) => handler(event),
            Err(e) => error!(path = %error_target, error = %e, "filesystem watcher error"),
        },
        notify::Config::default().with_poll_interval(config.watch_poll_interval),
    )
    .map_err(|e| VfsError::IoError(format!("create watcher for {}: {}", target_display, e)))?;

    watcher
        .watch(target, mode)
        .map_err(|e| VfsError::IoError(format!("watch {}: {}", target_display, e)))?;

    info!(path = %target_display, "filesystem watcher started");

    Ok(WatchHandle {
        _watcher: watcher,
        target: target_display,
    })
}
