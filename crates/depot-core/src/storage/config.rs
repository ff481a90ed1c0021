use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::model::platform::{Environment, EnvironmentOverrides};
use crate::storage::error::StorageSystemError;
use crate::storage::StorageProvider;
use crate::verification::TrustPolicy;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// Serialize a value in this format
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        let serialized = match self {
            ConfigFormat::Json => serde_json::to_string_pretty(value)
                .map_err(|e| serialization_error("json", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(value)
                .map_err(|e| serialization_error("yaml", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(value)
                .map_err(|e| serialization_error("toml", e)),
        };
        Ok(serialized?)
    }

    /// Deserialize a value from this format
    pub fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T> {
        let value = match self {
            ConfigFormat::Json => serde_json::from_str(data)
                .map_err(|e| deserialization_error("json", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data)
                .map_err(|e| deserialization_error("yaml", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data)
                .map_err(|e| deserialization_error("toml", e)),
        };
        Ok(value?)
    }
}

fn serialization_error<E: std::error::Error + Send + Sync + 'static>(format: &str, e: E) -> StorageSystemError {
    StorageSystemError::SerializationError { format: format.to_string(), source: Box::new(e) }
}

fn deserialization_error<E: std::error::Error + Send + Sync + 'static>(format: &str, e: E) -> StorageSystemError {
    StorageSystemError::DeserializationError { format: format.to_string(), source: Box::new(e) }
}

/// Engine configuration, read from a json, yaml or toml file.
///
/// Every field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotConfig {
    /// Number of configurations a site history keeps before evicting the oldest
    pub history_size: usize,
    /// Directory for staged downloads; a private temporary directory when unset
    pub staging_root: Option<PathBuf>,
    /// Timeout for a single HTTP transfer, in seconds
    pub http_timeout_secs: u64,
    /// User agent sent with HTTP requests
    pub user_agent: String,
    /// Overrides for the detected os/ws/arch/nl
    pub environment: EnvironmentOverrides,
    /// Answer given to verification prompts when nobody is asked interactively
    pub trust_policy: TrustPolicy,
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            history_size: constants::DEFAULT_HISTORY_SIZE,
            staging_root: None,
            http_timeout_secs: constants::DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: format!("{}/{}", constants::APP_NAME, constants::APP_VERSION),
            environment: EnvironmentOverrides::default(),
            trust_policy: TrustPolicy::default(),
        }
    }
}

impl DepotConfig {
    /// Load a configuration through a storage provider, picking the format from the extension.
    pub fn load(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        let content = provider.read_to_string(path)?;
        let config: DepotConfig = format.deserialize(&content)?;
        log::debug!("Loaded configuration from {}", provider.resolve(path).display());
        Ok(config)
    }

    /// Save the configuration through a storage provider in the format implied by the extension.
    pub fn save(&self, provider: &dyn StorageProvider, path: &Path) -> Result<()> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))?;
        provider.write_string(path, &format.serialize(self)?)
    }

    /// The running environment with configured overrides applied
    pub fn environment(&self) -> Environment {
        Environment::current().with_overrides(&self.environment)
    }

    /// HTTP timeout as a duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
