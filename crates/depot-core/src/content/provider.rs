use std::fmt::Debug;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::content::cache::ContentCache;
use crate::content::error::ContentError;
use crate::content::reference::{jar_entries, ContentReference};
use crate::kernel::constants::{ARCHIVE_EXTENSION, FEATURES_DIR, PLUGINS_DIR};
use crate::kernel::error::Result;
use crate::model::{size, Feature, NonPluginEntry, PluginEntry};
use crate::monitor::ProgressMonitor;
use crate::verification::Verifier;

/// Source of a feature's bytes.
///
/// Archive references are returned resolved to local files, so they can be
/// verified and stored without further network access.
#[async_trait]
pub trait FeatureContentProvider: Send + Sync + Debug {
    /// Where the content comes from
    fn url(&self) -> &Url;

    async fn feature_archive_references(&self, feature: &Feature, monitor: &dyn ProgressMonitor) -> Result<Vec<ContentReference>>;

    /// The individual files of the feature
    async fn feature_content_references(&self, feature: &Feature, monitor: &dyn ProgressMonitor) -> Result<Vec<ContentReference>>;

    async fn plugin_archive_references(
        &self,
        feature: &Feature,
        entry: &PluginEntry,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Vec<ContentReference>>;

    /// The individual files of a plugin, for unpacked installs
    async fn plugin_content_references(
        &self,
        feature: &Feature,
        entry: &PluginEntry,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Vec<ContentReference>>;

    async fn non_plugin_archive_references(
        &self,
        feature: &Feature,
        entry: &NonPluginEntry,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Vec<ContentReference>>;

    /// Verifier for this source's content, if it has one
    fn verifier(&self) -> Option<Arc<dyn Verifier>>;

    /// Bytes to download for the entries, or `UNKNOWN_SIZE`.
    fn download_size_for(&self, plugins: &[PluginEntry], non_plugins: &[NonPluginEntry]) -> i64 {
        size::download_size(plugins, non_plugins)
    }

    /// Bytes on disk after install, or `UNKNOWN_SIZE`.
    fn install_size_for(&self, plugins: &[PluginEntry], non_plugins: &[NonPluginEntry]) -> i64 {
        size::install_size(plugins, non_plugins)
    }
}

/// Provider for a site laid out as `features/<id>_<version>.jar`,
/// `plugins/<id>_<version>.jar` and non-plugin data at its identifier.
#[derive(Debug)]
pub struct ArchiveFeatureProvider {
    base: Url,
    cache: Arc<ContentCache>,
    verifier: Option<Arc<dyn Verifier>>,
}

impl ArchiveFeatureProvider {
    pub fn new(base: Url, cache: Arc<ContentCache>) -> Self {
        let mut base = base;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { base, cache, verifier: None }
    }

    /// A provider for a URL, or for a local directory when `location` does not parse as one.
    pub fn for_location(location: &str, cache: Arc<ContentCache>) -> Result<Self> {
        let base = match Url::parse(location) {
            Ok(url) if url.scheme().len() > 1 => url,
            _ => directory_url(Path::new(location))?,
        };
        Ok(Self::new(base, cache))
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    fn reference(&self, relative: &str) -> Result<ContentReference> {
        let url = self.base.join(relative).map_err(|e| ContentError::InvalidLocation {
            location: format!("{}{}", self.base, relative),
            reason: e.to_string(),
        })?;
        Ok(ContentReference::from_url(relative, url)?)
    }

    async fn archive(&self, relative: &str, monitor: &dyn ProgressMonitor) -> Result<Vec<ContentReference>> {
        let reference = self.reference(relative)?;
        let local = self.cache.resolve(&reference, monitor).await?;
        if let Ok(path) = local.as_file() {
            if !path.is_file() {
                let missing = io::Error::new(io::ErrorKind::NotFound, "archive not found");
                return Err(ContentError::io(missing, "open", path.display().to_string()).into());
            }
        }
        Ok(vec![local])
    }
}

fn contents(archives: &[ContentReference]) -> Result<Vec<ContentReference>> {
    let mut references = Vec::new();
    for archive in archives {
        references.extend(jar_entries(archive)?);
    }
    Ok(references)
}

/// `file:` URL of a directory, made absolute against the working directory.
fn directory_url(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path).map_err(|e| ContentError::io(e, "absolute", path.display().to_string()))?;
    Ok(Url::from_directory_path(&absolute).map_err(|_| ContentError::InvalidLocation {
        location: absolute.display().to_string(),
        reason: "not an absolute directory path".to_string(),
    })?)
}

#[async_trait]
impl FeatureContentProvider for ArchiveFeatureProvider {
    fn url(&self) -> &Url {
        &self.base
    }

    async fn feature_archive_references(&self, feature: &Feature, monitor: &dyn ProgressMonitor) -> Result<Vec<ContentReference>> {
        let relative = format!("{}/{}.{}", FEATURES_DIR, feature.identifier, ARCHIVE_EXTENSION);
        self.archive(&relative, monitor).await
    }

    async fn feature_content_references(&self, feature: &Feature, monitor: &dyn ProgressMonitor) -> Result<Vec<ContentReference>> {
        let archives = self.feature_archive_references(feature, monitor).await?;
        contents(&archives)
    }

    async fn plugin_archive_references(
        &self,
        _feature: &Feature,
        entry: &PluginEntry,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Vec<ContentReference>> {
        let relative = format!("{}/{}.{}", PLUGINS_DIR, entry.identifier, ARCHIVE_EXTENSION);
        self.archive(&relative, monitor).await
    }

    async fn plugin_content_references(
        &self,
        feature: &Feature,
        entry: &PluginEntry,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Vec<ContentReference>> {
        let archives = self.plugin_archive_references(feature, entry, monitor).await?;
        contents(&archives)
    }

    async fn non_plugin_archive_references(
        &self,
        _feature: &Feature,
        entry: &NonPluginEntry,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Vec<ContentReference>> {
        self.archive(&entry.identifier, monitor).await
    }

    fn verifier(&self) -> Option<Arc<dyn Verifier>> {
        self.verifier.clone()
    }
}
