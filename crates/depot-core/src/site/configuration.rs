use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::VersionedIdentifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    FeatureInstalled,
    FeatureRemoved,
    FeatureConfigured,
    FeatureUnconfigured,
    Reverted,
    ConfigurationAdded,
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityAction::FeatureInstalled => "installed",
            ActivityAction::FeatureRemoved => "removed",
            ActivityAction::FeatureConfigured => "configured",
            ActivityAction::FeatureUnconfigured => "unconfigured",
            ActivityAction::Reverted => "reverted",
            ActivityAction::ConfigurationAdded => "configuration added",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[default]
    Ok,
    Failed,
}

/// One entry of a configuration's activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub action: ActivityAction,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: ActivityStatus,
}

impl Activity {
    pub fn new(action: ActivityAction, label: impl Into<String>) -> Self {
        Self { action, label: label.into(), timestamp: Utc::now(), status: ActivityStatus::Ok }
    }

    pub fn failed(mut self) -> Self {
        self.status = ActivityStatus::Failed;
        self
    }
}

/// Features configured in one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredSite {
    pub location: PathBuf,
    #[serde(default)]
    pub features: BTreeSet<VersionedIdentifier>,
}

/// A snapshot of which features are configured where.
///
/// `id` is assigned by the history the configuration is added to, which also
/// maintains `current`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallConfiguration {
    pub id: u64,
    pub label: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub sites: Vec<ConfiguredSite>,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub preserved: bool,
}

impl InstallConfiguration {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: 0,
            label: label.into(),
            created: Utc::now(),
            activities: Vec::new(),
            sites: Vec::new(),
            current: false,
            preserved: false,
        }
    }

    /// A new configuration with the same configured features and an empty activity log.
    pub fn successor(&self, label: impl Into<String>) -> Self {
        Self {
            sites: self.sites.clone(),
            ..Self::new(label)
        }
    }

    pub fn site(&self, location: &Path) -> Option<&ConfiguredSite> {
        self.sites.iter().find(|s| s.location == location)
    }

    fn site_mut(&mut self, location: &Path) -> &mut ConfiguredSite {
        let index = match self.sites.iter().position(|s| s.location == location) {
            Some(index) => index,
            None => {
                self.sites.push(ConfiguredSite { location: location.to_path_buf(), features: BTreeSet::new() });
                self.sites.len() - 1
            }
        };
        &mut self.sites[index]
    }

    pub fn configured_features(&self, location: &Path) -> BTreeSet<VersionedIdentifier> {
        self.site(location).map(|s| s.features.clone()).unwrap_or_default()
    }

    pub fn is_configured(&self, location: &Path, feature: &VersionedIdentifier) -> bool {
        self.site(location).is_some_and(|s| s.features.contains(feature))
    }

    /// Returns false if the feature was already configured.
    pub fn configure(&mut self, location: &Path, feature: VersionedIdentifier) -> bool {
        self.site_mut(location).features.insert(feature)
    }

    /// Returns false if the feature was not configured.
    pub fn unconfigure(&mut self, location: &Path, feature: &VersionedIdentifier) -> bool {
        self.site_mut(location).features.remove(feature)
    }

    pub fn set_configured(&mut self, location: &Path, features: BTreeSet<VersionedIdentifier>) {
        self.site_mut(location).features = features;
    }

    pub fn record(&mut self, activity: Activity) {
        self.activities.push(activity);
    }
}

impl fmt::Display for InstallConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({})", self.id, self.label, self.created.format("%Y-%m-%d %H:%M:%S"))?;
        if self.current {
            f.write_str(" [current]")?;
        }
        if self.preserved {
            f.write_str(" [preserved]")?;
        }
        Ok(())
    }
}
