/*!
 * Pending Loads
 * Promise/future pair shared by every requester of one path
 */

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::factory::ErasedAsset;
use crate::core::errors::AssetError;

/// Observable state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// No cache entry
    Unloaded,
    /// Entry published, result not yet available
    Loading,
    /// Loader produced a value
    Loaded,
    /// Resolution or loader failed; sticky until unloaded
    Failed,
}

pub(crate) type LoadOutcome = Result<ErasedAsset, AssetError>;

/// The single in-flight-or-completed result for one path
pub(crate) struct PendingLoad {
    path: String,
    outcome: Mutex<Option<LoadOutcome>>,
    ready: Condvar,
}

impl PendingLoad {
    pub(crate) fn new(path: String) -> Arc<Self> {
        Arc::new(Self {
            path,
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        })
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn state(&self) -> LoadState {
        match self.outcome.lock().as_ref() {
            None => LoadState::Loading,
            Some(Ok(_)) => LoadState::Loaded,
            Some(Err(_)) => LoadState::Failed,
        }
    }

    /// Block until the outcome is available
    pub(crate) fn wait(&self) -> LoadOutcome {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut outcome);
        }
    }

    /// Outcome if already available
    pub(crate) fn try_get(&self) -> Option<LoadOutcome> {
        self.outcome.lock().clone()
    }

    /// First completion wins; later ones are ignored
    fn complete(&self, result: LoadOutcome) -> bool {
        let mut outcome = self.outcome.lock();
        if outcome.is_some() {
            return false;
        }
        *outcome = Some(result);
        drop(outcome);
        self.ready.notify_all();
        true
    }
}

/// Write side of a pending load
///
/// Dropping a ticket without finishing it fails the load, so waiters never
/// block on a producer that went away.
pub(crate) struct LoadTicket {
    slot: Arc<PendingLoad>,
    finished: bool,
}

impl LoadTicket {
    pub(crate) fn new(slot: Arc<PendingLoad>) -> Self {
        Self {
            slot,
            finished: false,
        }
    }

    pub(crate) fn path(&self) -> &str {
        self.slot.path()
    }

    pub(crate) fn finish(mut self, result: LoadOutcome) {
        self.finished = true;
        self.slot.complete(result);
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if !self.finished {
            self.slot.complete(Err(AssetError::load_failure(
                self.slot.path(),
                "load was abandoned before completing",
            )));
        }
    }
}
