//! Plugin accounting across the features of one site.
use std::collections::HashSet;

use crate::model::{Feature, FeatureImport, PluginEntry, VersionedIdentifier};
use crate::site::site::Site;

/// Entries of `source` that `target` does not already hold, by identifier and version.
///
/// Order of `source` is kept.
pub fn plugin_delta(source: &[PluginEntry], target: &[PluginEntry]) -> Vec<PluginEntry> {
    let present: HashSet<&VersionedIdentifier> = target.iter().map(|entry| &entry.identifier).collect();
    source
        .iter()
        .filter(|entry| !present.contains(&entry.identifier))
        .cloned()
        .collect()
}

/// Plugins of `feature` that no other feature of `site` references.
///
/// Computed from the site's current features on every call.
pub fn plugins_only_referenced_by(site: &Site, feature: &VersionedIdentifier) -> Vec<PluginEntry> {
    let Some(owner) = site.feature(feature) else {
        return Vec::new();
    };
    let others: Vec<PluginEntry> = site
        .features()
        .iter()
        .filter(|other| other.identifier != *feature)
        .flat_map(|other| other.plugins.iter().cloned())
        .collect();
    plugin_delta(&owner.plugins, &others)
}

/// Imports of `feature` satisfied neither by the site's plugins nor by the feature's own.
pub fn unsatisfied_imports(feature: &Feature, site: &Site) -> Vec<FeatureImport> {
    let available: Vec<&VersionedIdentifier> = site
        .features()
        .iter()
        .chain(std::iter::once(feature))
        .flat_map(|f| f.plugins.iter().map(|entry| &entry.identifier))
        .collect();
    feature
        .imports
        .iter()
        .filter(|import| !available.iter().any(|plugin| import.is_satisfied_by(plugin)))
        .cloned()
        .collect()
}
