/*!
 * Asset Manager
 * Single-flight load orchestration, cache bookkeeping and disposal
 */

use ahash::RandomState;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::factory::{AssetLoader, FactoryEntry, FactoryRegistry, TypeKey};
use super::handle::AssetHandle;
use super::pending::{LoadOutcome, LoadState, LoadTicket, PendingLoad};
use super::reload::Subscription;
use super::workers::WorkerPool;
use super::Asset;
use crate::core::config::AssetConfig;
use crate::core::errors::{AssetError, AssetResult};
use crate::monitoring::span_load;
use crate::vfs::paths::normalize_path;
use crate::vfs::{
    ArchiveFS, AssetStream, FileSystem, LocalFS, MountId, MountPoint, MountTable, Resolved,
    WatchHandle,
};

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests answered by an existing entry
    pub hits: u64,
    /// Requests that published a new entry
    pub misses: u64,
    /// Loader runs started
    pub loads_started: u64,
    /// Loads that ended in a failure
    pub load_failures: u64,
    /// Entries removed by unload, unload_all or hot reload
    pub evictions: u64,
    /// Subset of evictions caused by change notifications
    pub hot_reloads: u64,
    /// Entries currently cached
    pub cached: usize,
}

#[derive(Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads_started: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
    hot_reloads: AtomicU64,
}

impl CacheCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// State shared by the manager, its handles and hot-reload listeners
pub(crate) struct ManagerInner {
    config: AssetConfig,
    mounts: RwLock<MountTable>,
    subscriptions: Mutex<HashMap<MountId, Subscription, RandomState>>,
    /// Host watchers started by `mount_folder` and `mount_archive`
    watchers: Mutex<HashMap<MountId, WatchHandle, RandomState>>,
    factories: RwLock<FactoryRegistry>,
    /// The only lock guarding cache entries
    cache: Mutex<HashMap<String, Arc<PendingLoad>, RandomState>>,
    counters: Arc<CacheCounters>,
    workers: WorkerPool,
}

/// Asset manager: mounts, factories and the path-keyed cache
///
/// Cloning is cheap and yields another view of the same cache.
#[derive(Clone)]
pub struct AssetManager {
    inner: Arc<ManagerInner>,
}

impl AssetManager {
    /// Create a manager with default configuration
    pub fn new() -> Self {
        Self::with_config(AssetConfig::default())
    }

    pub fn with_config(config: AssetConfig) -> Self {
        let config = config.sanitized();
        let workers = WorkerPool::new(config.worker_threads);
        info!(workers = workers.thread_count(), "asset manager starting");

        Self {
            inner: Arc::new(ManagerInner {
                workers,
                config,
                mounts: RwLock::new(MountTable::new()),
                subscriptions: Mutex::new(HashMap::default()),
                watchers: Mutex::new(HashMap::default()),
                factories: RwLock::new(FactoryRegistry::new()),
                cache: Mutex::new(HashMap::default()),
                counters: Arc::new(CacheCounters::default()),
            }),
        }
    }

    pub fn config(&self) -> &AssetConfig {
        &self.inner.config
    }

    /// Mount a filesystem at `prefix`
    ///
    /// Later mounts shadow earlier ones. With `hot_reload`, change
    /// notifications from the filesystem evict the matching cache entries.
    pub fn mount(
        &self,
        prefix: &str,
        fs: Arc<dyn FileSystem>,
        hot_reload: bool,
    ) -> AssetResult<MountPoint> {
        let point = self
            .inner
            .mounts
            .write()
            .mount(prefix, Arc::clone(&fs), hot_reload);

        info!(
            prefix = %point.prefix,
            fs = %point.name,
            hot_reload,
            "filesystem mounted"
        );

        if hot_reload {
            match Subscription::attach(&self.inner, &point.prefix, fs) {
                Some(subscription) => {
                    self.inner.subscriptions.lock().insert(point.id, subscription);
                }
                None => warn!(
                    prefix = %point.prefix,
                    fs = %point.name,
                    "filesystem emits no change events, hot reload unavailable"
                ),
            }
        }

        Ok(point)
    }

    /// Mount the host folder `root` at `prefix`
    ///
    /// With `hot_reload`, a watcher turns changes on disk into evictions. It
    /// is started before the folder is mounted, so a watch failure leaves the
    /// mount table untouched. The watcher stops when the mount is removed.
    pub fn mount_folder<P: Into<PathBuf>>(
        &self,
        prefix: &str,
        root: P,
        hot_reload: bool,
    ) -> AssetResult<MountPoint> {
        let fs = Arc::new(LocalFS::with_config(root, &self.inner.config));
        let watcher = if hot_reload {
            Some(fs.watch(&self.inner.config).map_err(watch_error)?)
        } else {
            None
        };
        self.mount_watched(prefix, fs, hot_reload, watcher)
    }

    /// Mount the zip archive at `path` under `prefix`
    ///
    /// With `hot_reload`, rewriting the archive on disk reloads its entry
    /// table and evicts the entries it still contains.
    pub fn mount_archive<P: Into<PathBuf>>(
        &self,
        prefix: &str,
        path: P,
        hot_reload: bool,
    ) -> AssetResult<MountPoint> {
        let fs = Arc::new(ArchiveFS::open_with_config(path, &self.inner.config)?);
        let watcher = if hot_reload {
            Some(fs.watch(&self.inner.config).map_err(watch_error)?)
        } else {
            None
        };
        self.mount_watched(prefix, fs, hot_reload, watcher)
    }

    fn mount_watched(
        &self,
        prefix: &str,
        fs: Arc<dyn FileSystem>,
        hot_reload: bool,
        watcher: Option<WatchHandle>,
    ) -> AssetResult<MountPoint> {
        let point = self.mount(prefix, fs, hot_reload)?;
        if let Some(watcher) = watcher {
            self.inner.watchers.lock().insert(point.id, watcher);
        }
        Ok(point)
    }

    /// Remove the most recent mount at `prefix`, restoring whatever it shadowed
    ///
    /// Cached entries are left alone.
    pub fn unmount(&self, prefix: &str) -> AssetResult<MountPoint> {
        let point = self
            .inner
            .mounts
            .write()
            .unmount(prefix)
            .ok_or_else(|| AssetError::MountNotFound {
                prefix: prefix.to_string(),
            })?;

        // Dropping the subscription detaches the listener
        self.inner.subscriptions.lock().remove(&point.id);
        self.inner.watchers.lock().remove(&point.id);
        info!(prefix = %point.prefix, fs = %point.name, "filesystem unmounted");
        Ok(point)
    }

    /// Mounts, most recent first
    pub fn mounts(&self) -> Vec<MountPoint> {
        self.inner.mounts.read().list()
    }

    /// Register the loader for `T`
    ///
    /// With `allow_background`, loads run on the worker pool; otherwise they
    /// run on the requesting thread.
    pub fn register_factory<T, F>(&self, loader: F, allow_background: bool) -> AssetResult<()>
    where
        T: Asset,
        F: Fn(&mut dyn Read) -> Result<T, super::BoxError> + Send + Sync + 'static,
    {
        self.register_loader::<T, F>(loader, allow_background)
    }

    /// Register a loader object for `T`
    pub fn register_loader<T, L>(&self, loader: L, allow_background: bool) -> AssetResult<()>
    where
        T: Asset,
        L: AssetLoader<T>,
    {
        let mut factories = self.inner.factories.write();
        factories.register::<T, L>(loader, allow_background)?;
        debug!(
            type_name = std::any::type_name::<T>(),
            allow_background,
            registered = factories.len(),
            "factory registered"
        );
        Ok(())
    }

    pub fn has_factory<T: Asset>(&self) -> bool {
        self.inner.factories.read().contains(TypeKey::of::<T>())
    }

    /// Request `path` as `T` and return a handle to it
    ///
    /// Starts the load unless the path is already cached. Missing factories
    /// and unresolvable paths fail here; loader errors surface from
    /// `AssetHandle::value`.
    pub fn load<T: Asset>(&self, path: &str) -> AssetResult<AssetHandle<T>> {
        let handle = self.handle::<T>(path);
        handle.ensure_loading()?;
        Ok(handle)
    }

    /// Handle for `path` without starting a load
    pub fn handle<T: Asset>(&self, path: &str) -> AssetHandle<T> {
        AssetHandle::new(Arc::clone(&self.inner), normalize_path(path))
    }

    /// Unload then load again; the explicit retry path for failed entries
    pub fn reload<T: Asset>(&self, path: &str) -> AssetResult<AssetHandle<T>> {
        self.unload(path);
        self.load::<T>(path)
    }

    /// Open the raw stream behind `path`, bypassing factories and the cache
    pub fn open(&self, path: &str) -> AssetResult<AssetStream> {
        let path = normalize_path(path);
        self.inner
            .mounts
            .read()
            .resolve(&path)
            .map(|resolved| resolved.stream)
            .ok_or(AssetError::NotFound { path })
    }

    /// Whether any mount serves `path`
    pub fn exists(&self, path: &str) -> bool {
        self.inner.mounts.read().exists(path)
    }

    pub fn state(&self, path: &str) -> LoadState {
        self.inner.state(path)
    }

    /// Evict `path`, waiting for an in-flight load and releasing its value
    pub fn unload(&self, path: &str) {
        self.inner.unload(path);
    }

    /// Evict every cached entry
    pub fn unload_all(&self) {
        self.inner.unload_all();
    }

    /// Cached virtual paths, sorted
    pub fn cached_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.cache.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            loads_started: c.loads_started.load(Ordering::Relaxed),
            load_failures: c.load_failures.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            hot_reloads: c.hot_reloads.load(Ordering::Relaxed),
            cached: self.inner.cache.lock().len(),
        }
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerInner {
    /// Entry for `path`, starting a load if there is none
    ///
    /// The pending slot is published before the path is resolved, so every
    /// concurrent requester shares it and a change notification arriving
    /// mid-load evicts it once it completes.
    pub(crate) fn request_load(&self, key: TypeKey, path: &str) -> AssetResult<Arc<PendingLoad>> {
        let path = normalize_path(path);

        if let Some(slot) = self.cached(&path) {
            CacheCounters::bump(&self.counters.hits);
            return Ok(slot);
        }

        let factory = self.factories.read().get(key)?;

        let (slot, ticket) = {
            let mut cache = self.cache.lock();
            if let Some(slot) = cache.get(&path) {
                CacheCounters::bump(&self.counters.hits);
                return Ok(Arc::clone(slot));
            }
            let slot = PendingLoad::new(path.clone());
            cache.insert(path.clone(), Arc::clone(&slot));
            (Arc::clone(&slot), LoadTicket::new(slot))
        };
        CacheCounters::bump(&self.counters.misses);

        let resolved = self.mounts.read().resolve(&path);
        let Some(resolved) = resolved else {
            // Unpublish the slot, then fail it for anyone who already joined
            self.remove_if_current(&slot);
            let error = AssetError::NotFound { path };
            ticket.finish(Err(error.clone()));
            return Err(error);
        };

        self.dispatch(factory, resolved, ticket);
        Ok(slot)
    }

    fn dispatch(&self, factory: Arc<FactoryEntry>, resolved: Resolved, ticket: LoadTicket) {
        CacheCounters::bump(&self.counters.loads_started);
        let counters = Arc::clone(&self.counters);
        let Resolved { mut stream, fs, .. } = resolved;

        if !factory.allow_background() {
            let outcome = run_loader(&factory, ticket.path(), &mut stream, &counters);
            ticket.finish(outcome);
            return;
        }

        if fs.is_thread_safe() {
            self.workers.execute(move || {
                let outcome = run_loader(&factory, ticket.path(), &mut stream, &counters);
                ticket.finish(outcome);
            });
            return;
        }

        // Drain the backend on this thread; only the buffer crosses threads
        let mut buffer = Vec::new();
        if let Err(e) = stream.read_to_end(&mut buffer) {
            CacheCounters::bump(&counters.load_failures);
            let error = AssetError::load_failure(ticket.path(), format!("read failed: {}", e));
            ticket.finish(Err(error));
            return;
        }
        drop(stream);

        debug!(
            path = %ticket.path(),
            fs = fs.name(),
            bytes = buffer.len(),
            "buffered stream from single-threaded filesystem"
        );

        self.workers.execute(move || {
            let mut reader = Cursor::new(buffer);
            let outcome = run_loader(&factory, ticket.path(), &mut reader, &counters);
            ticket.finish(outcome);
        });
    }

    pub(crate) fn cached(&self, path: &str) -> Option<Arc<PendingLoad>> {
        self.cache.lock().get(path).cloned()
    }

    pub(crate) fn state(&self, path: &str) -> LoadState {
        self.cached(&normalize_path(path))
            .map(|slot| slot.state())
            .unwrap_or(LoadState::Unloaded)
    }

    /// Wait for the entry's load, remove the entry if it is still the same
    /// one, then release the value; returns true if this call removed it
    pub(crate) fn unload(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let Some(slot) = self.cached(&path) else {
            return false;
        };

        let outcome = slot.wait();
        if !self.remove_if_current(&slot) {
            return false;
        }

        CacheCounters::bump(&self.counters.evictions);
        release(&path, outcome);
        true
    }

    pub(crate) fn unload_all(&self) {
        let slots: Vec<Arc<PendingLoad>> = self.cache.lock().values().cloned().collect();

        let mut removed = 0usize;
        for slot in slots {
            let outcome = slot.wait();
            if self.remove_if_current(&slot) {
                CacheCounters::bump(&self.counters.evictions);
                release(slot.path(), outcome);
                removed += 1;
            }
        }

        info!(removed, "unloaded all assets");
    }

    pub(crate) fn record_hot_reload(&self) {
        CacheCounters::bump(&self.counters.hot_reloads);
    }

    fn remove_if_current(&self, slot: &Arc<PendingLoad>) -> bool {
        let mut cache = self.cache.lock();
        match cache.get(slot.path()) {
            Some(current) if Arc::ptr_eq(current, slot) => {
                cache.remove(slot.path());
                true
            }
            _ => false,
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        // Release whatever finished loading; in-flight loads are not awaited
        let cache = std::mem::take(self.cache.get_mut());
        for (path, slot) in cache {
            if let Some(outcome) = slot.try_get() {
                release(&path, outcome);
            }
        }
    }
}

fn watch_error(e: crate::vfs::VfsError) -> AssetError {
    warn!(error = %e, "could not start filesystem watcher");
    AssetError::Watch(e.to_string())
}

fn release(path: &str, outcome: LoadOutcome) {
    if let Ok(asset) = outcome {
        asset.release();
        debug!(path = %path, "asset released");
    }
}

/// Run a factory, turning errors and panics into load failures
fn run_loader(
    factory: &FactoryEntry,
    path: &str,
    reader: &mut dyn Read,
    counters: &CacheCounters,
) -> LoadOutcome {
    let mut span = span_load(path, factory.type_name());
    let result = {
        let _guard = span.enter();
        panic::catch_unwind(AssertUnwindSafe(|| factory.load(reader)))
    };

    let outcome = match result {
        Ok(Ok(asset)) => Ok(asset),
        Ok(Err(e)) => Err(AssetError::load_failure(path, e.to_string())),
        Err(payload) => Err(AssetError::load_failure(path, panic_message(payload.as_ref()))),
    };

    match &outcome {
        Ok(_) => debug!(
            path = %path,
            type_name = factory.type_name(),
            elapsed_us = span.elapsed_us(),
            "asset loaded"
        ),
        Err(e) => {
            span.fail();
            CacheCounters::bump(&counters.load_failures);
            warn!(path = %path, type_name = factory.type_name(), error = %e, "asset load failed");
        }
    }

    outcome
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("loader panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("loader panicked: {}", s)
    } else {
        "loader panicked".to_string()
    }
}

#[cfg(test)]
impl ManagerInner {
    fn insert_loaded<T: Asset>(&self, path: &str, value: T) {
        let slot = PendingLoad::new(path.to_string());
        LoadTicket::new(Arc::clone(&slot))
            .finish(Ok(super::factory::ErasedAsset::new(value)));
        self.cache.lock().insert(path.to_string(), slot);
    }
}
