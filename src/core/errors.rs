/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::vfs::types::{VfsError, VfsResult};

/// Asset operation result
#[must_use = "asset operations can fail and must be handled"]
pub type AssetResult<T> = Result<T, AssetError>;

/// Errors surfaced by the asset manager and its handles
///
/// Every variant is `Clone` so that one failed load can be handed to each
/// waiter sharing the same pending slot.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum AssetError {
    #[error("No mounted filesystem serves '{path}'")]
    #[diagnostic(
        code(asset::not_found),
        help("Check the mount prefixes and that the backing file exists.")
    )]
    NotFound { path: String },

    #[error("No factory registered for type {type_name}")]
    #[diagnostic(
        code(asset::no_factory),
        help("Register a loader with AssetManager::register_factory before loading.")
    )]
    NoFactory { type_name: String },

    #[error("A factory for type {type_name} is already registered")]
    #[diagnostic(
        code(asset::duplicate_factory),
        help("Each result type accepts exactly one factory.")
    )]
    DuplicateFactory { type_name: String },

    #[error("Failed to load '{path}': {message}")]
    #[diagnostic(
        code(asset::load_failure),
        help("The entry stays failed until it is unloaded; unload it to retry.")
    )]
    LoadFailure { path: String, message: String },

    #[error("'{path}' is cached with a type other than {expected}")]
    #[diagnostic(
        code(asset::type_mismatch),
        help("The cache is keyed by path; unload the path before loading it as another type.")
    )]
    TypeMismatch { path: String, expected: String },

    #[error("No mount at prefix '{prefix}'")]
    #[diagnostic(code(asset::mount_not_found))]
    MountNotFound { prefix: String },

    #[error("Filesystem watch failed: {0}")]
    #[diagnostic(
        code(asset::watch),
        help("Mount without hot reload, or check that the watched path is a readable directory.")
    )]
    Watch(String),

    #[error("Filesystem error: {0}")]
    #[diagnostic(code(asset::filesystem))]
    Filesystem(#[from] VfsError),
}

impl AssetError {
    pub(crate) fn load_failure(path: &str, message: impl Into<String>) -> Self {
        AssetError::LoadFailure {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// True for errors raised while the loader ran, as opposed to resolution
    /// or dispatch errors
    pub fn is_load_failure(&self) -> bool {
        matches!(self, AssetError::LoadFailure { .. })
    }
}
