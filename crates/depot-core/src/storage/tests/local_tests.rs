use std::path::PathBuf;
use std::io::Write;
use tempfile::tempdir;

use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;
use crate::storage::local::LocalStorageProvider;

// Helper function to create PathBuf from str for tests
fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

#[test]
fn test_write_and_read_string() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    provider.write_string(&p("meta/site.json"), "{\"features\":[]}")?;

    // Parent directories are created on demand
    assert!(provider.is_dir(&p("meta")));
    assert_eq!(provider.read_to_string(&p("meta/site.json"))?, "{\"features\":[]}");

    Ok(())
}

#[test]
fn test_write_replaces_existing_content() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    provider.write_bytes(&p("history.json"), b"first version, longer")?;
    provider.write_bytes(&p("history.json"), b"second")?;

    assert_eq!(provider.read_to_string(&p("history.json"))?, "second");
    // No temporary files left next to the target
    assert_eq!(provider.read_dir(&p(""))?, vec![p("history.json")]);

    Ok(())
}

#[test]
fn test_read_missing_file_is_not_found() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    let result = provider.read_to_string(&p("absent.json"));
    assert!(matches!(result, Err(Error::StorageSystem(StorageSystemError::FileNotFound(_)))));
}

#[test]
fn test_rename_and_remove() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    provider.create_dir_all(&p("staging/plugins/a_1.0.0"))?;
    provider.write_bytes(&p("staging/plugins/a_1.0.0/plugin.xml"), b"<plugin/>")?;
    provider.create_dir_all(&p("plugins"))?;

    provider.rename(&p("staging/plugins/a_1.0.0"), &p("plugins/a_1.0.0"))?;
    assert!(provider.is_file(&p("plugins/a_1.0.0/plugin.xml")));
    assert!(!provider.exists(&p("staging/plugins/a_1.0.0")));

    provider.remove_dir_all(&p("plugins/a_1.0.0"))?;
    assert!(!provider.exists(&p("plugins/a_1.0.0")));

    provider.write_bytes(&p("plugins/b_1.0.0.jar"), b"jar")?;
    provider.remove_file(&p("plugins/b_1.0.0.jar"))?;
    assert!(provider.read_dir(&p("plugins"))?.is_empty());

    Ok(())
}

#[test]
fn test_read_dir_returns_relative_paths() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    let sub_dir = p("features");
    provider.create_dir_all(&sub_dir.join("f_1.0.0"))?;
    provider.write_bytes(&sub_dir.join("f_2.0.0.jar"), b"data")?;

    let listed = provider.read_dir(&sub_dir)?;
    assert_eq!(listed, vec![sub_dir.join("f_1.0.0"), sub_dir.join("f_2.0.0.jar")]);

    Ok(())
}

#[test]
fn test_open_write_and_resolve() -> Result<()> {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let provider = LocalStorageProvider::new(temp_dir.path().to_path_buf());

    {
        let mut writer = provider.open_write(&p("out.bin"))?;
        writer.write_all(b"streamed").expect("write failed");
    }

    assert_eq!(provider.resolve(&p("out.bin")), temp_dir.path().join("out.bin"));
    assert_eq!(std::fs::read(temp_dir.path().join("out.bin")).expect("read failed"), b"streamed");
    assert_eq!(provider.name(), "local");

    Ok(())
}
