#![cfg(test)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::{tempdir, TempDir};
use url::Url;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::connection::ConnectionManager;
use crate::content::{ArchiveFeatureProvider, ContentCache};
use crate::model::{Feature, PluginEntry, VersionedIdentifier};

pub fn vid(id: &str, version: &str) -> VersionedIdentifier {
    VersionedIdentifier::parse(id, version).expect("valid version")
}

/// Write a zip archive with the given entries.
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create jar parent");
    }
    let file = File::create(path).expect("create jar");
    let mut zip = ZipWriter::new(file);
    for (name, bytes) in entries {
        zip.start_file(*name, FileOptions::default()).expect("start entry");
        zip.write_all(bytes).expect("write entry");
    }
    zip.finish().expect("finish jar");
}

pub fn connections() -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(Duration::from_secs(5), "depot-test").expect("connection manager"))
}

pub fn cache() -> Arc<ContentCache> {
    Arc::new(ContentCache::new(connections()).expect("content cache"))
}

/// An update site on disk laid out the way [`ArchiveFeatureProvider`] reads it.
pub struct UpdateSiteFixture {
    dir: TempDir,
}

impl UpdateSiteFixture {
    pub fn new() -> Self {
        Self { dir: tempdir().expect("Failed to create temp directory") }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> Url {
        Url::from_directory_path(self.root()).expect("absolute fixture path")
    }

    pub fn feature_jar(&self, identifier: &VersionedIdentifier) -> PathBuf {
        self.root().join("features").join(format!("{}.jar", identifier))
    }

    pub fn plugin_jar(&self, identifier: &VersionedIdentifier) -> PathBuf {
        self.root().join("plugins").join(format!("{}.jar", identifier))
    }

    /// Publish the feature archive and one archive per plugin.
    pub fn publish(&self, feature: &Feature) {
        let manifest = serde_json::to_vec_pretty(feature).expect("feature json");
        write_jar(&self.feature_jar(&feature.identifier), &[
            ("feature.json", &manifest),
            ("license.txt", b"Use at will"),
        ]);
        for plugin in &feature.plugins {
            self.publish_plugin(plugin);
        }
    }

    pub fn publish_plugin(&self, plugin: &PluginEntry) {
        let descriptor = format!("id={}\nversion={}\n", plugin.identifier.id, plugin.identifier.version);
        write_jar(&self.plugin_jar(&plugin.identifier), &[
            ("plugin.properties", descriptor.as_bytes()),
            ("lib/code.bin", &[0xca, 0xfe, 0xba, 0xbe]),
        ]);
    }

    pub fn publish_data(&self, identifier: &str, bytes: &[u8]) {
        let path = self.root().join(identifier);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create data parent");
        }
        fs::write(path, bytes).expect("write data");
    }

    pub fn provider(&self, cache: Arc<ContentCache>) -> ArchiveFeatureProvider {
        ArchiveFeatureProvider::new(self.url(), cache)
    }
}
