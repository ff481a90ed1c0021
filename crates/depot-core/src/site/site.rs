use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::content::consumer::{FeatureContentConsumer, SiteFileConsumer};
use crate::install::orchestrator::InstallTarget;
use crate::kernel::constants::{FEATURES_DIR, PLUGINS_DIR};
use crate::kernel::error::Result;
use crate::model::{Feature, FeatureReference, PluginEntry, VersionedIdentifier};
use crate::site::error::SiteError;

/// Features installed in one site directory.
///
/// Installed features are detached copies of what the caller installed,
/// associated with this site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(skip)]
    root: PathBuf,
    #[serde(default)]
    features: Vec<Feature>,
}

impl Site {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), features: Vec::new() }
    }

    /// Bind a deserialized site to its directory and re-associate its features.
    pub fn attach(mut self, root: impl Into<PathBuf>) -> Result<Self> {
        self.root = root.into();
        let url = self.url()?;
        for feature in &self.features {
            feature.set_site(url.clone())?;
        }
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `file:` URL of the site directory
    pub fn url(&self) -> Result<Url> {
        Url::from_directory_path(&self.root).map_err(|_| {
            SiteError::InvalidLocation {
                path: self.root.clone(),
                reason: "not an absolute directory path".to_string(),
            }
            .into()
        })
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, identifier: &VersionedIdentifier) -> Option<&Feature> {
        self.features.iter().find(|f| f.identifier == *identifier)
    }

    pub fn contains(&self, identifier: &VersionedIdentifier) -> bool {
        self.feature(identifier).is_some()
    }

    /// Every plugin of every installed feature, each identifier once.
    pub fn plugins(&self) -> Vec<PluginEntry> {
        let mut seen = HashSet::new();
        self.features
            .iter()
            .flat_map(|f| f.plugins.iter())
            .filter(|entry| seen.insert(entry.identifier.clone()))
            .cloned()
            .collect()
    }

    /// Record an installed feature. Returns false if it was already recorded.
    pub fn adopt(&mut self, feature: &Feature) -> Result<bool> {
        if self.contains(&feature.identifier) {
            return Ok(false);
        }
        let copy = feature.detached();
        copy.set_site(self.url()?)?;
        self.features.push(copy);
        Ok(true)
    }

    pub fn forget(&mut self, identifier: &VersionedIdentifier) -> Option<Feature> {
        let index = self.features.iter().position(|f| f.identifier == *identifier)?;
        Some(self.features.remove(index))
    }

    /// Installed feature directory, relative to the root
    pub fn feature_path(identifier: &VersionedIdentifier) -> PathBuf {
        Path::new(FEATURES_DIR).join(identifier.to_string())
    }

    /// Installed plugin jar or directory, relative to the root
    pub fn plugin_path(entry: &PluginEntry) -> PathBuf {
        Path::new(PLUGINS_DIR).join(entry.install_name())
    }
}

impl InstallTarget for Site {
    fn plugins(&self) -> Vec<PluginEntry> {
        Site::plugins(self)
    }

    fn installed_feature(&self, identifier: &VersionedIdentifier) -> Option<FeatureReference> {
        self.feature(identifier).map(|f| FeatureReference {
            identifier: f.identifier.clone(),
            location: self.root.join(Self::feature_path(identifier)),
        })
    }

    fn create_consumer(&self, feature: &Feature) -> Result<Box<dyn FeatureContentConsumer>> {
        Ok(Box::new(SiteFileConsumer::new(&self.root, feature.identifier.clone())?))
    }
}
