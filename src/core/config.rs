/*!
 * Asset Configuration
 *
 * Runtime configuration for the loader pool and filesystem watchers
 */

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::vfs::observable::DEFAULT_EVENT_CAPACITY;

/// Asset manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Number of background loader threads
    pub worker_threads: usize,
    /// Buffered events per backend broadcast channel
    pub event_capacity: usize,
    /// Poll interval for watchers that fall back to polling
    #[serde(with = "millis")]
    pub watch_poll_interval: Duration,
    /// Changes to one path are held until it has been quiet this long
    #[serde(with = "millis")]
    pub watch_debounce: Duration,
}

impl Default for AssetConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads: workers,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            watch_poll_interval: Duration::from_millis(500),
            watch_debounce: Duration::from_millis(100),
        }
    }
}

impl AssetConfig {
    /// One background worker; loads still run off the calling thread
    pub fn single_threaded() -> Self {
        Self {
            worker_threads: 1,
            ..Self::default()
        }
    }

    /// Defaults overridden by environment variables
    ///
    /// Environment variables:
    /// - ASSET_WORKER_THREADS: background loader threads
    /// - ASSET_EVENT_CAPACITY: broadcast buffer per backend
    /// - ASSET_WATCH_POLL_MS: watcher poll interval
    /// - ASSET_WATCH_DEBOUNCE_MS: watcher debounce window
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_parse::<usize>("ASSET_WORKER_THREADS") {
            config.worker_threads = n;
        }
        if let Some(n) = env_parse::<usize>("ASSET_EVENT_CAPACITY") {
            config.event_capacity = n;
        }
        if let Some(ms) = env_parse::<u64>("ASSET_WATCH_POLL_MS") {
            config.watch_poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("ASSET_WATCH_DEBOUNCE_MS") {
            config.watch_debounce = Duration::from_millis(ms);
        }

        config.sanitized()
    }

    /// Clamp values the pool and channels cannot work with
    pub(crate) fn sanitized(mut self) -> Self {
        self.worker_threads = self.worker_threads.max(1);
        self.event_capacity = self.event_capacity.max(1);
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid asset configuration value");
            None
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
