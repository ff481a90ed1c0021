//! # Depot Core Storage
//!
//! Filesystem access for site metadata and engine configuration.
//!
//! - [`StorageProvider`]: relative-path file operations behind a trait.
//! - [`LocalStorageProvider`]: the local filesystem implementation, with atomic writes.
//! - [`DepotConfig`]: engine configuration in json, yaml or toml.
//! - [`MetadataStore`]: json documents under a site's `.depot` directory.
pub mod config;
pub mod error;
pub mod local;
pub mod metadata;
pub mod provider;

/// Re-export key types
pub use provider::StorageProvider;
pub use local::LocalStorageProvider;
pub use config::{ConfigFormat, DepotConfig};
pub use metadata::MetadataStore;

// Test module declaration
#[cfg(test)]
mod tests;
