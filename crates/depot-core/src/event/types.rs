use std::any::Any;
use std::path::PathBuf;

use crate::event::Event;
use crate::model::VersionedIdentifier;

/// A change to a local site, published after it has been persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteEvent {
    FeatureInstalled { site: PathBuf, feature: VersionedIdentifier },
    FeatureRemoved { site: PathBuf, feature: VersionedIdentifier },
    FeatureConfigured { site: PathBuf, feature: VersionedIdentifier },
    FeatureUnconfigured { site: PathBuf, feature: VersionedIdentifier },
    /// A new configuration became current
    ConfigurationAdded { site: PathBuf, configuration: u64 },
    /// The site was reverted to an older configuration
    Reverted { site: PathBuf, from: u64, configuration: u64 },
    /// An install failed and was rolled back
    InstallFailed { site: PathBuf, feature: VersionedIdentifier, reason: String },
}

impl SiteEvent {
    pub const FEATURE_INSTALLED: &'static str = "site.feature_installed";
    pub const FEATURE_REMOVED: &'static str = "site.feature_removed";
    pub const FEATURE_CONFIGURED: &'static str = "site.feature_configured";
    pub const FEATURE_UNCONFIGURED: &'static str = "site.feature_unconfigured";
    pub const CONFIGURATION_ADDED: &'static str = "site.configuration_added";
    pub const REVERTED: &'static str = "site.reverted";
    pub const INSTALL_FAILED: &'static str = "site.install_failed";

    /// Root of the site the event is about
    pub fn site(&self) -> &PathBuf {
        match self {
            SiteEvent::FeatureInstalled { site, .. }
            | SiteEvent::FeatureRemoved { site, .. }
            | SiteEvent::FeatureConfigured { site, .. }
            | SiteEvent::FeatureUnconfigured { site, .. }
            | SiteEvent::ConfigurationAdded { site, .. }
            | SiteEvent::Reverted { site, .. }
            | SiteEvent::InstallFailed { site, .. } => site,
        }
    }

    pub fn feature(&self) -> Option<&VersionedIdentifier> {
        match self {
            SiteEvent::FeatureInstalled { feature, .. }
            | SiteEvent::FeatureRemoved { feature, .. }
            | SiteEvent::FeatureConfigured { feature, .. }
            | SiteEvent::FeatureUnconfigured { feature, .. }
            | SiteEvent::InstallFailed { feature, .. } => Some(feature),
            SiteEvent::ConfigurationAdded { .. } | SiteEvent::Reverted { .. } => None,
        }
    }
}

impl Event for SiteEvent {
    fn name(&self) -> &'static str {
        match self {
            SiteEvent::FeatureInstalled { .. } => Self::FEATURE_INSTALLED,
            SiteEvent::FeatureRemoved { .. } => Self::FEATURE_REMOVED,
            SiteEvent::FeatureConfigured { .. } => Self::FEATURE_CONFIGURED,
            SiteEvent::FeatureUnconfigured { .. } => Self::FEATURE_UNCONFIGURED,
            SiteEvent::ConfigurationAdded { .. } => Self::CONFIGURATION_ADDED,
            SiteEvent::Reverted { .. } => Self::REVERTED,
            SiteEvent::InstallFailed { .. } => Self::INSTALL_FAILED,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
