/*!
 * Asset Handles
 * Typed accessors that always read the live cache entry
 */

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::factory::TypeKey;
use super::manager::ManagerInner;
use super::pending::LoadState;
use super::Asset;
use crate::core::errors::{AssetError, AssetResult};

/// Handle to the asset at one path, decoded as `T`
///
/// A handle owns no data. Every query goes to the cache, so after a
/// hot-reload eviction the next `value()` transparently loads the new
/// contents.
pub struct AssetHandle<T: Asset> {
    manager: Arc<ManagerInner>,
    path: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Asset> AssetHandle<T> {
    pub(crate) fn new(manager: Arc<ManagerInner>, path: String) -> Self {
        Self {
            manager,
            path: Arc::from(path),
            _marker: PhantomData,
        }
    }

    /// Normalized virtual path
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> LoadState {
        self.manager.state(&self.path)
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Loaded
    }

    /// Start loading unless the path already has a cache entry
    pub fn ensure_loading(&self) -> AssetResult<()> {
        self.manager
            .request_load(TypeKey::of::<T>(), &self.path)
            .map(|_| ())
    }

    /// Block until the value is available
    ///
    /// Loads the path first if it is not cached, e.g. after an eviction.
    pub fn value(&self) -> AssetResult<Arc<T>> {
        let slot = self.manager.request_load(TypeKey::of::<T>(), &self.path)?;
        let asset = slot.wait()?;
        self.downcast(&asset)
    }

    /// The value if the load already finished, without blocking or loading
    pub fn try_value(&self) -> Option<AssetResult<Arc<T>>> {
        let slot = self.manager.cached(&self.path)?;
        let outcome = slot.try_get()?;
        Some(outcome.and_then(|asset| self.downcast(&asset)))
    }

    fn downcast(&self, asset: &super::factory::ErasedAsset) -> AssetResult<Arc<T>> {
        asset.downcast::<T>().ok_or_else(|| AssetError::TypeMismatch {
            path: self.path.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
    }
}

impl<T: Asset> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            path: Arc::clone(&self.path),
            _marker: PhantomData,
        }
    }
}

impl<T: Asset> fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("path", &self.path)
            .field("type", &std::any::type_name::<T>())
            .field("state", &self.state())
            .finish()
    }
}
