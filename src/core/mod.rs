/*!
 * Core Module
 * Configuration and error types shared by the filesystem and asset layers
 */

pub mod config;
pub mod errors;

// Re-export for convenience
pub use config::AssetConfig;
pub use errors::*;
