/*!
 * Asset Module
 * Typed, cached loading on top of the virtual filesystem
 *
 * A load resolves a virtual path through the mount table, runs the factory
 * registered for the requested type and keeps the single result per path
 * until it is unloaded or a hot-reload change notification evicts it.
 */

pub mod factory;
pub mod handle;
pub mod manager;
mod pending;
mod reload;
mod workers;

pub use factory::{AssetLoader, BoxError};
pub use handle::AssetHandle;
pub use manager::{AssetManager, CacheStats};
pub use pending::LoadState;

/// Types that can be produced by a factory and held in the cache
///
/// Loaded values are shared between threads, hence the bounds.
pub trait Asset: Send + Sync + 'static {
    /// Release capability, queried when the value is unloaded
    fn as_releasable(&self) -> Option<&dyn Releasable> {
        None
    }
}

/// Values holding resources that must be freed explicitly
///
/// `release` runs exactly once, after the load completed, when the cache
/// entry is removed by an unload or a hot-reload eviction.
pub trait Releasable {
    fn release(&self);
}

impl Asset for String {}
impl Asset for Vec<u8> {}
