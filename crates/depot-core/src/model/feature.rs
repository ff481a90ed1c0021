use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::entry::{FeatureImport, InstallHandlerEntry, NonPluginEntry, PluginEntry};
use crate::model::identifier::VersionedIdentifier;
use crate::model::platform::Environment;
use crate::site::error::SiteError;

/// A named, versioned, installable unit.
///
/// The object graph is supplied fully populated by whoever reads the feature's
/// manifest. The site a feature belongs to is assigned once; the source it is
/// read from and the sink it is written to are passed per operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(flatten)]
    pub identifier: VersionedIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
    #[serde(default)]
    pub non_plugins: Vec<NonPluginEntry>,
    #[serde(default)]
    pub imports: Vec<FeatureImport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_handler: Option<InstallHandlerEntry>,
    #[serde(skip)]
    site: OnceLock<Url>,
}

impl Feature {
    pub fn new(identifier: VersionedIdentifier) -> Self {
        Self {
            identifier,
            label: None,
            plugins: Vec::new(),
            non_plugins: Vec::new(),
            imports: Vec::new(),
            install_handler: None,
            site: OnceLock::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_plugin(mut self, entry: PluginEntry) -> Self {
        self.plugins.push(entry);
        self
    }

    pub fn with_non_plugin(mut self, entry: NonPluginEntry) -> Self {
        self.non_plugins.push(entry);
        self
    }

    pub fn with_import(mut self, import: FeatureImport) -> Self {
        self.imports.push(import);
        self
    }

    pub fn with_install_handler(mut self, entry: InstallHandlerEntry) -> Self {
        self.install_handler = Some(entry);
        self
    }

    /// Associate the feature with a site. Fails if it already belongs to one.
    pub fn set_site(&self, site: Url) -> Result<(), SiteError> {
        let rejected = match self.site.set(site) {
            Ok(()) => return Ok(()),
            Err(rejected) => rejected,
        };
        Err(SiteError::SiteAlreadyAssigned {
            feature: self.identifier.to_string(),
            site: self.site.get().map(Url::to_string).unwrap_or_else(|| rejected.to_string()),
        })
    }

    pub fn site(&self) -> Option<&Url> {
        self.site.get()
    }

    /// A copy with the same content and no site association.
    pub fn detached(&self) -> Self {
        Self {
            site: OnceLock::new(),
            ..self.clone()
        }
    }

    /// Display label, falling back to the identifier
    pub fn display_name(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.identifier.to_string())
    }

    /// Plugin entries whose platform filters accept `environment`.
    pub fn plugin_entries_for(&self, environment: &Environment) -> Vec<PluginEntry> {
        self.plugins
            .iter()
            .filter(|entry| entry.platform.matches(environment))
            .cloned()
            .collect()
    }

    /// Non-plugin entries whose platform filters accept `environment`.
    pub fn non_plugin_entries_for(&self, environment: &Environment) -> Vec<NonPluginEntry> {
        self.non_plugins
            .iter()
            .filter(|entry| entry.platform.matches(environment))
            .cloned()
            .collect()
    }
}
