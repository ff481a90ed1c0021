use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::model::identifier::{parse_version, VersionedIdentifier};
use crate::model::platform::PlatformConstraints;

/// A plugin shipped by a feature.
///
/// Two entries are the same plugin when their identifiers (id and version) are
/// equal; platform filters and sizes do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEntry {
    #[serde(flatten)]
    pub identifier: VersionedIdentifier,
    #[serde(flatten)]
    pub platform: PlatformConstraints,
    /// Bytes to download, `None` when unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_size: Option<u64>,
    /// Bytes on disk after install, `None` when unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_size: Option<u64>,
    /// Extract the archive into a directory rather than keeping the jar
    #[serde(default)]
    pub unpack: bool,
    #[serde(default)]
    pub fragment: bool,
}

impl PluginEntry {
    pub fn new(identifier: VersionedIdentifier) -> Self {
        Self {
            identifier,
            platform: PlatformConstraints::default(),
            download_size: None,
            install_size: None,
            unpack: false,
            fragment: false,
        }
    }

    pub fn with_sizes(mut self, download_size: Option<u64>, install_size: Option<u64>) -> Self {
        self.download_size = download_size;
        self.install_size = install_size;
        self
    }

    pub fn unpacked(mut self) -> Self {
        self.unpack = true;
        self
    }

    pub fn with_platform(mut self, platform: PlatformConstraints) -> Self {
        self.platform = platform;
        self
    }

    /// Name of the installed plugin: a directory when unpacked, a jar otherwise.
    pub fn install_name(&self) -> String {
        if self.unpack {
            self.identifier.to_string()
        } else {
            format!("{}.{}", self.identifier, crate::kernel::constants::ARCHIVE_EXTENSION)
        }
    }
}

impl PartialEq for PluginEntry {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for PluginEntry {}

impl Hash for PluginEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

/// Opaque data shipped by a feature, placed by its install handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonPluginEntry {
    /// Archive path relative to the feature's source, e.g. `data/readme.txt`
    pub identifier: String,
    #[serde(flatten)]
    pub platform: PlatformConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_size: Option<u64>,
}

impl NonPluginEntry {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            platform: PlatformConstraints::default(),
            download_size: None,
            install_size: None,
        }
    }

    pub fn with_sizes(mut self, download_size: Option<u64>, install_size: Option<u64>) -> Self {
        self.download_size = download_size;
        self.install_size = install_size;
        self
    }
}

/// How an import's version constrains the installed plugin version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Identical version
    Perfect,
    /// Same major and minor, at least the given service level
    Equivalent,
    /// Same major, at least the given version
    #[default]
    Compatible,
    /// At least the given version
    GreaterOrEqual,
}

impl MatchRule {
    pub fn accepts(&self, required: &Version, candidate: &Version) -> bool {
        let at_least = (candidate.major, candidate.minor, candidate.patch)
            >= (required.major, required.minor, required.patch);
        match self {
            MatchRule::Perfect => candidate == required,
            MatchRule::Equivalent => {
                candidate.major == required.major && candidate.minor == required.minor && at_least
            }
            MatchRule::Compatible => candidate.major == required.major && at_least,
            MatchRule::GreaterOrEqual => at_least,
        }
    }
}

/// A plugin required by a feature but shipped elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureImport {
    pub plugin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub rule: MatchRule,
}

impl FeatureImport {
    /// Whether `plugin` satisfies this import. An unparsable version requirement never matches.
    pub fn is_satisfied_by(&self, plugin: &VersionedIdentifier) -> bool {
        if plugin.id != self.plugin {
            return false;
        }
        match &self.version {
            None => true,
            Some(required) => match parse_version(required) {
                Ok(required) => self.rule.accepts(&required, &plugin.version),
                Err(_) => false,
            },
        }
    }
}

impl fmt::Display for FeatureImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {} ({:?})", self.plugin, version, self.rule),
            None => f.write_str(&self.plugin),
        }
    }
}

/// Names the install handler a feature wants, looked up in the handler registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallHandlerEntry {
    pub handler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

impl InstallHandlerEntry {
    pub fn named(handler: impl Into<String>) -> Self {
        Self { handler: handler.into(), argument: None }
    }
}

/// Handle to an installed feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureReference {
    pub identifier: VersionedIdentifier,
    /// Installed feature directory
    pub location: PathBuf,
}
