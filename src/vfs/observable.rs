/*!
 * Observable VFS - Event System for File Watching
 * Synchronous listeners for cache invalidation plus a broadcast channel for observers
 */

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

use super::types::FileEvent;

type Listener = Arc<dyn Fn(&FileEvent) + Send + Sync>;

/// Broadcast buffer used when no configuration is given
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Identifies a registered listener for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event broadcaster owned by a filesystem backend
///
/// Listeners run on the emitting thread, in registration order, before
/// `emit` returns. Broadcast subscribers receive the event afterwards and may
/// lag or miss events if they are slow.
#[derive(Clone)]
pub struct EventBroadcaster {
    listeners: Arc<RwLock<Vec<(ListenerId, Listener)>>>,
    next_id: Arc<AtomicU64>,
    sender: Arc<broadcast::Sender<FileEvent>>,
}

impl EventBroadcaster {
    /// Create new broadcaster with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            sender: Arc::new(sender),
        }
    }

    /// Register a synchronous listener
    pub fn listen<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&FileEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unlisten(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Subscribe to events asynchronously
    /// Returns a receiver that will get all future events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            inner: self.sender.subscribe(),
            skipped: 0,
        }
    }

    /// Deliver an event to every listener, then to broadcast subscribers
    pub fn emit(&self, event: FileEvent) {
        // Snapshot so listeners may (un)register without deadlocking
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener(&event);
        }

        // Ignore errors - if no subscribers, that's fine
        let _ = self.sender.send(event);
    }

    /// Number of synchronous listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Number of active broadcast subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Broadcast subscription
///
/// A receiver that falls more than the channel capacity behind skips the
/// oldest events, logs how many were lost and carries on with the oldest one
/// still buffered.
pub struct EventReceiver {
    inner: broadcast::Receiver<FileEvent>,
    skipped: u64,
}

impl EventReceiver {
    /// Next event, or None once every broadcaster is gone
    pub async fn recv(&mut self) -> Option<FileEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => self.lagged(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<FileEvent> {
        loop {
            match self.inner.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => self.lagged(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Total events this receiver has lost to lag
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn lagged(&mut self, n: u64) {
        self.skipped += n;
        warn!(skipped = n, total = self.skipped, "event subscriber lagged, events dropped");
    }
}

impl std::fmt::Debug for EventReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReceiver")
            .field("skipped", &self.skipped)
            .finish()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
