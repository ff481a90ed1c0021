//! # Depot Core Model
//!
//! The object graph callers hand to the engine: versioned identifiers, plugin
//! and non-plugin entries with platform filters and sizes, and features.
pub mod entry;
pub mod feature;
pub mod identifier;
pub mod platform;
pub mod size;

pub use entry::{
    FeatureImport, FeatureReference, InstallHandlerEntry, MatchRule, NonPluginEntry, PluginEntry,
};
pub use feature::Feature;
pub use identifier::{parse_version, VersionError, VersionedIdentifier};
pub use platform::{Environment, EnvironmentOverrides, PlatformConstraints};

#[cfg(test)]
mod tests;
