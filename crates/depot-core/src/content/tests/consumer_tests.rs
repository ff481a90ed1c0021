use std::fs;
use std::path::Path;

use tempfile::tempdir;

use crate::content::consumer::{FeatureContentConsumer, SiteFileConsumer};
use crate::content::error::ContentError;
use crate::content::reference::{jar_entries, ContentReference};
use crate::kernel::error::{Error, Result};
use crate::model::{NonPluginEntry, PluginEntry};
use crate::tests::integration::common::{vid, write_jar};

fn local(dir: &Path, identifier: &str, bytes: &[u8]) -> ContentReference {
    let path = dir.join(identifier.replace('/', "_"));
    fs::write(&path, bytes).unwrap();
    ContentReference::local(identifier, path)
}

#[test]
fn test_commit_moves_staged_content_into_site() -> Result<()> {
    let source = tempdir().expect("Failed to create temp directory");
    let site = tempdir().expect("Failed to create temp directory");
    let mut consumer = SiteFileConsumer::new(site.path(), vid("f", "1.0"))?;
    let staging = consumer.staging_dir();
    assert!(staging.is_dir());

    consumer.store(&local(source.path(), "feature.json", b"{}"))?;

    let packed = PluginEntry::new(vid("a", "1.0"));
    let mut plugin = consumer.open_plugin(&packed)?;
    plugin.store(&local(source.path(), "plugins/a_1.0.0.jar", b"packed"))?;
    plugin.close()?;

    let jar = source.path().join("b.jar");
    write_jar(&jar, &[("plugin.properties", b"id=b"), ("lib/code.bin", b"code")]);
    let unpacked = PluginEntry::new(vid("b", "1.0")).unpacked();
    let mut plugin = consumer.open_plugin(&unpacked)?;
    for entry in jar_entries(&ContentReference::local("plugins/b_1.0.0.jar", &jar))? {
        plugin.store(&entry)?;
    }
    plugin.close()?;

    let mut data = consumer.open_non_plugin(&NonPluginEntry::new("data/readme.txt"))?;
    data.store(&local(source.path(), "data/readme.txt", b"read me"))?;
    data.close()?;

    assert!(!site.path().join("plugins").exists(), "nothing visible before commit");
    let reference = consumer.close()?;

    assert_eq!(reference.location, site.path().join("features").join("f_1.0.0"));
    assert_eq!(fs::read(site.path().join("features/f_1.0.0/feature.json")).unwrap(), b"{}");
    assert_eq!(fs::read(site.path().join("plugins/a_1.0.0.jar")).unwrap(), b"packed");
    assert_eq!(fs::read(site.path().join("plugins/b_1.0.0/lib/code.bin")).unwrap(), b"code");
    assert_eq!(fs::read(site.path().join("data/f_1.0.0/readme.txt")).unwrap(), b"read me");
    assert!(!staging.exists());
    Ok(())
}

#[test]
fn test_open_sub_consumer_blocks_commit() -> Result<()> {
    let source = tempdir().expect("Failed to create temp directory");
    let site = tempdir().expect("Failed to create temp directory");
    let mut consumer = SiteFileConsumer::new(site.path(), vid("f", "1.0"))?;

    let mut plugin = consumer.open_plugin(&PluginEntry::new(vid("a", "1.0")))?;
    plugin.store(&local(source.path(), "a.jar", b"a"))?;

    let err = consumer.close().unwrap_err();
    assert!(matches!(err, Error::Content(ContentError::OpenSubConsumers { open: 1, .. })));

    plugin.close()?;
    consumer.close()?;
    assert!(site.path().join("plugins/a_1.0.0.jar").is_file());
    Ok(())
}

#[test]
fn test_abort_discards_everything() -> Result<()> {
    let source = tempdir().expect("Failed to create temp directory");
    let site = tempdir().expect("Failed to create temp directory");
    let mut consumer = SiteFileConsumer::new(site.path(), vid("f", "1.0"))?;
    let staging = consumer.staging_dir();

    consumer.store(&local(source.path(), "feature.json", b"{}"))?;
    let mut plugin = consumer.open_plugin(&PluginEntry::new(vid("a", "1.0")))?;
    plugin.store(&local(source.path(), "a.jar", b"a"))?;

    consumer.abort()?;
    assert!(!staging.exists());
    assert!(!site.path().join("features").exists());
    assert!(!site.path().join("plugins").exists());

    let err = consumer.store(&local(source.path(), "late.txt", b"late")).unwrap_err();
    assert!(matches!(err, Error::Content(ContentError::ConsumerClosed { .. })));
    consumer.abort()?;
    Ok(())
}

#[test]
fn test_escaping_entry_paths_are_rejected() -> Result<()> {
    let source = tempdir().expect("Failed to create temp directory");
    let site = tempdir().expect("Failed to create temp directory");
    let mut consumer = SiteFileConsumer::new(site.path(), vid("f", "1.0"))?;

    for path in ["../evil.txt", "/etc/passwd", "a/../../evil.txt"] {
        let reference = ContentReference::local(path, source.path().join("x"));
        let err = consumer.store(&reference).unwrap_err();
        assert!(matches!(err, Error::Content(ContentError::UnsafeEntryPath { .. })), "{} accepted", path);
    }
    consumer.abort()
}

#[test]
fn test_installed_plugins_are_kept_and_features_conflict() -> Result<()> {
    let source = tempdir().expect("Failed to create temp directory");
    let site = tempdir().expect("Failed to create temp directory");
    fs::create_dir_all(site.path().join("plugins")).unwrap();
    fs::write(site.path().join("plugins/a_1.0.0.jar"), b"installed").unwrap();

    let mut consumer = SiteFileConsumer::new(site.path(), vid("f", "1.0"))?;
    let mut plugin = consumer.open_plugin(&PluginEntry::new(vid("a", "1.0")))?;
    plugin.store(&local(source.path(), "a.jar", b"incoming"))?;
    plugin.close()?;
    consumer.store(&local(source.path(), "feature.json", b"{}"))?;
    consumer.close()?;
    assert_eq!(fs::read(site.path().join("plugins/a_1.0.0.jar")).unwrap(), b"installed");

    let mut again = SiteFileConsumer::new(site.path(), vid("f", "1.0"))?;
    again.store(&local(source.path(), "feature.json", b"{}"))?;
    let err = again.close().unwrap_err();
    assert!(matches!(err, Error::Content(ContentError::AlreadyInstalled { .. })));
    again.abort()
}
