use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::kernel::error::Result;
use crate::storage::config::ConfigFormat;
use crate::storage::StorageProvider;

/// JSON documents kept in a site's metadata directory.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    provider: Arc<dyn StorageProvider>,
    dir: PathBuf,
}

impl MetadataStore {
    /// Documents live under `dir`, relative to the provider's base path.
    pub fn new(provider: Arc<dyn StorageProvider>, dir: impl Into<PathBuf>) -> Self {
        Self { provider, dir: dir.into() }
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.provider.is_file(&self.path_of(name))
    }

    /// Load a document, `None` if it was never written.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.path_of(name);
        if !self.provider.is_file(&path) {
            return Ok(None);
        }
        let content = self.provider.read_to_string(&path)?;
        ConfigFormat::Json.deserialize(&content).map(Some)
    }

    /// Atomically replace a document.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let content = ConfigFormat::Json.serialize(value)?;
        self.provider.write_string(&self.path_of(name), &content)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
