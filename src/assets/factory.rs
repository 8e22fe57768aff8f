/*!
 * Factory Registry
 * One byte-stream-to-value loader per result type
 */

use ahash::RandomState;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::io::Read;
use std::marker::PhantomData;
use std::sync::Arc;

use super::Asset;
use crate::core::errors::{AssetError, AssetResult};

/// Error type loaders may return
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Turns a byte stream into an asset of type `T`
///
/// Closures `Fn(&mut dyn Read) -> Result<T, BoxError>` implement this trait.
pub trait AssetLoader<T: Asset>: Send + Sync + 'static {
    fn load(&self, reader: &mut dyn Read) -> Result<T, BoxError>;
}

impl<T, F> AssetLoader<T> for F
where
    T: Asset,
    F: Fn(&mut dyn Read) -> Result<T, BoxError> + Send + Sync + 'static,
{
    fn load(&self, reader: &mut dyn Read) -> Result<T, BoxError> {
        self(reader)
    }
}

/// Type identity plus a readable name for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TypeKey {
    pub(crate) id: TypeId,
    pub(crate) name: &'static str,
}

impl TypeKey {
    pub(crate) fn of<T: Asset>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// A loaded value with its concrete type erased
#[derive(Clone)]
pub(crate) struct ErasedAsset {
    value: Arc<dyn Any + Send + Sync>,
    release: fn(&(dyn Any + Send + Sync)),
}

impl ErasedAsset {
    pub(crate) fn new<T: Asset>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            release: release_as::<T>,
        }
    }

    pub(crate) fn downcast<T: Asset>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Invoke the value's release capability, if it has one
    pub(crate) fn release(&self) {
        (self.release)(self.value.as_ref())
    }
}

fn release_as<T: Asset>(value: &(dyn Any + Send + Sync)) {
    if let Some(releasable) = value.downcast_ref::<T>().and_then(Asset::as_releasable) {
        releasable.release();
    }
}

/// Internal trait for loading any asset type
trait ErasedLoader: Send + Sync {
    fn load_erased(&self, reader: &mut dyn Read) -> Result<ErasedAsset, BoxError>;
}

/// Adapts a typed `AssetLoader<T>` to `ErasedLoader`
struct TypedLoader<T, L>(L, PhantomData<fn() -> T>);

impl<T: Asset, L: AssetLoader<T>> ErasedLoader for TypedLoader<T, L> {
    fn load_erased(&self, reader: &mut dyn Read) -> Result<ErasedAsset, BoxError> {
        let asset: T = self.0.load(reader)?;
        Ok(ErasedAsset::new(asset))
    }
}

/// A registered factory
pub(crate) struct FactoryEntry {
    type_name: &'static str,
    allow_background: bool,
    loader: Box<dyn ErasedLoader>,
}

impl FactoryEntry {
    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn allow_background(&self) -> bool {
        self.allow_background
    }

    pub(crate) fn load(&self, reader: &mut dyn Read) -> Result<ErasedAsset, BoxError> {
        self.loader.load_erased(reader)
    }
}

/// Registry mapping result types to their factories
#[derive(Default)]
pub(crate) struct FactoryRegistry {
    factories: HashMap<TypeId, Arc<FactoryEntry>, RandomState>,
}

impl FactoryRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `T`; a second registration is rejected
    pub(crate) fn register<T, L>(&mut self, loader: L, allow_background: bool) -> AssetResult<()>
    where
        T: Asset,
        L: AssetLoader<T>,
    {
        let key = TypeKey::of::<T>();
        if self.factories.contains_key(&key.id) {
            return Err(AssetError::DuplicateFactory {
                type_name: key.name.to_string(),
            });
        }

        self.factories.insert(
            key.id,
            Arc::new(FactoryEntry {
                type_name: key.name,
                allow_background,
                loader: Box::new(TypedLoader(loader, PhantomData)),
            }),
        );
        Ok(())
    }

    pub(crate) fn get(&self, key: TypeKey) -> AssetResult<Arc<FactoryEntry>> {
        self.factories
            .get(&key.id)
            .cloned()
            .ok_or_else(|| AssetError::NoFactory {
                type_name: key.name.to_string(),
            })
    }

    pub(crate) fn contains(&self, key: TypeKey) -> bool {
        self.factories.contains_key(&key.id)
    }

    pub(crate) fn len(&self) -> usize {
        self.factories.len()
    }
}
