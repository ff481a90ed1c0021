use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::{tempdir, TempDir};
use zip::write::FileOptions;
use zip::ZipWriter;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(path.parent().ok_or("jar without parent")?)?;
    let mut zip = ZipWriter::new(File::create(path)?);
    for (name, bytes) in entries {
        zip.start_file(*name, FileOptions::default())?;
        zip.write_all(bytes)?;
    }
    zip.finish()?;
    Ok(())
}

/// An update site with `org.demo_1.0.0` shipping two plugins, and a
/// second feature sharing one of them.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let workspace = Self { dir: tempdir()? };
        workspace.publish("org.demo", &["org.demo.core", "org.demo.ui"])?;
        workspace.publish("org.other", &["org.demo.core", "org.other.tools"])?;
        Ok(workspace)
    }

    fn updates(&self) -> PathBuf {
        self.dir.path().join("updates")
    }

    fn site(&self) -> PathBuf {
        self.dir.path().join("site")
    }

    fn description(&self, id: &str) -> PathBuf {
        self.dir.path().join(format!("{}.json", id))
    }

    fn publish(&self, id: &str, plugins: &[&str]) -> TestResult {
        let feature = json!({
            "id": id,
            "version": "1.0.0",
            "label": format!("{} feature", id),
            "plugins": plugins
                .iter()
                .map(|p| json!({ "id": p, "version": "1.0.0", "download_size": 10, "install_size": 25 }))
                .collect::<Vec<_>>(),
        });
        let manifest = serde_json::to_vec_pretty(&feature)?;
        fs::write(self.description(id), &manifest)?;
        write_jar(
            &self.updates().join("features").join(format!("{}_1.0.0.jar", id)),
            &[("feature.json", &manifest)],
        )?;
        for plugin in plugins {
            let descriptor = format!("id={}\n", plugin);
            write_jar(
                &self.updates().join("plugins").join(format!("{}_1.0.0.jar", plugin)),
                &[("plugin.properties", descriptor.as_bytes())],
            )?;
        }
        Ok(())
    }

    fn depot(&self) -> Result<Command, Box<dyn std::error::Error>> {
        let mut cmd = Command::cargo_bin("depot")?;
        cmd.arg("--site").arg(self.site());
        Ok(cmd)
    }

    fn install(&self, id: &str) -> Result<Command, Box<dyn std::error::Error>> {
        let mut cmd = self.depot()?;
        cmd.arg("install").arg(self.description(id)).arg("--from").arg(self.updates());
        Ok(cmd)
    }
}

#[test]
fn test_help_lists_commands() -> TestResult {
    Command::cargo_bin("depot")?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("revert"));
    Ok(())
}

#[test]
fn test_site_is_required() -> TestResult {
    Command::cargo_bin("depot")?
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--site"));
    Ok(())
}

#[test]
fn test_list_empty_site() -> TestResult {
    let workspace = Workspace::new()?;
    workspace.depot()?
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No features installed."));
    assert!(workspace.site().join(".depot").is_dir());
    Ok(())
}

#[test]
fn test_install_and_list() -> TestResult {
    let workspace = Workspace::new()?;
    workspace.install("org.demo")?
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed org.demo_1.0.0"));

    let site = workspace.site();
    assert!(site.join("features").join("org.demo_1.0.0").join("feature.json").is_file());
    assert!(site.join("plugins").join("org.demo.core_1.0.0.jar").is_file());
    assert!(site.join("plugins").join("org.demo.ui_1.0.0.jar").is_file());

    workspace.depot()?
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("org.demo_1.0.0"))
        .stdout(predicate::str::contains("org.demo feature"))
        .stdout(predicate::str::contains("[configured]"));
    Ok(())
}

#[test]
fn test_history_and_revert() -> TestResult {
    let workspace = Workspace::new()?;
    workspace.install("org.demo")?.assert().success();

    workspace.depot()?
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("#1"))
        .stdout(predicate::str::contains("#2"))
        .stdout(predicate::str::contains("installed"));

    workspace.depot()?
        .args(["revert", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reverted to configuration 1 as 3"));

    // Reverting changes what is configured, not what is installed.
    workspace.depot()?
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("org.demo_1.0.0"))
        .stdout(predicate::str::contains("[unconfigured]"));

    workspace.depot()?
        .args(["revert", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("42"));
    Ok(())
}

#[test]
fn test_configure_toggles() -> TestResult {
    let workspace = Workspace::new()?;
    workspace.install("org.demo")?.assert().success();

    workspace.depot()?
        .args(["unconfigure", "org.demo", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unconfigured org.demo_1.0.0"));
    workspace.depot()?
        .args(["unconfigure", "org.demo", "1.0.0"])
        .assert()
        .failure();
    workspace.depot()?
        .args(["configure", "org.demo", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configured org.demo_1.0.0"));
    Ok(())
}

#[test]
fn test_remove_keeps_shared_plugins() -> TestResult {
    let workspace = Workspace::new()?;
    workspace.install("org.demo")?.assert().success();
    workspace.install("org.other")?.assert().success();

    workspace.depot()?
        .args(["orphans", "org.demo", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("org.demo.ui_1.0.0"))
        .stdout(predicate::str::contains("org.demo.core_1.0.0").not());

    workspace.depot()?
        .args(["remove", "org.demo", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed org.demo_1.0.0"));

    let plugins = workspace.site().join("plugins");
    assert!(!workspace.site().join("features").join("org.demo_1.0.0").exists());
    assert!(!plugins.join("org.demo.ui_1.0.0.jar").exists());
    assert!(plugins.join("org.demo.core_1.0.0.jar").is_file());
    assert!(plugins.join("org.other.tools_1.0.0.jar").is_file());

    workspace.depot()?
        .args(["remove", "org.demo", "1.0.0"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_size_reports_declared_sizes() -> TestResult {
    let workspace = Workspace::new()?;
    workspace.depot()?
        .arg("size")
        .arg(workspace.description("org.demo"))
        .arg("--from")
        .arg(workspace.updates())
        .assert()
        .success()
        .stdout(predicate::str::contains("download: 20 bytes"))
        .stdout(predicate::str::contains("install: 50 bytes"));
    Ok(())
}

#[test]
fn test_install_warns_about_missing_imports() -> TestResult {
    let workspace = Workspace::new()?;
    let description = workspace.description("org.demo");
    let mut feature: serde_json::Value = serde_json::from_slice(&fs::read(&description)?)?;
    feature["imports"] = json!([{ "plugin": "org.base.runtime", "version": "2.0", "rule": "compatible" }]);
    fs::write(&description, serde_json::to_vec_pretty(&feature)?)?;

    workspace.install("org.demo")?
        .assert()
        .success()
        .stderr(predicate::str::contains("warning: org.demo_1.0.0 requires org.base.runtime 2.0"))
        .stdout(predicate::str::contains("Installed org.demo_1.0.0"));

    workspace.install("org.other")?
        .assert()
        .success()
        .stderr(predicate::str::contains("warning:").not());
    Ok(())
}

#[test]
fn test_missing_archive_fails_cleanly() -> TestResult {
    let workspace = Workspace::new()?;
    fs::remove_file(workspace.updates().join("plugins").join("org.demo.ui_1.0.0.jar"))?;

    workspace.install("org.demo")?
        .assert()
        .failure()
        .stderr(predicate::str::contains("org.demo_1.0.0"));

    let site = workspace.site();
    assert!(!site.join("features").join("org.demo_1.0.0").exists());
    assert!(!site.join("plugins").join("org.demo.core_1.0.0.jar").exists());
    workspace.depot()?
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No features installed."));
    Ok(())
}

#[test]
fn test_unsigned_content_needs_trust() -> TestResult {
    let workspace = Workspace::new()?;
    let digests = workspace.dir.path().join("digests.json");
    fs::write(&digests, serde_json::to_vec(&json!({ "signer": "CN=Demo", "digests": {} }))?)?;

    workspace.install("org.demo")?
        .arg("--digests")
        .arg(&digests)
        .arg("--trust")
        .arg("never")
        .assert()
        .failure()
        .stderr(predicate::str::contains("verification"));

    workspace.install("org.demo")?
        .arg("--digests")
        .arg(&digests)
        .arg("--trust")
        .arg("once")
        .assert()
        .success()
        .stderr(predicate::str::contains("accepted once"));
    Ok(())
}

#[test]
fn test_corrupted_content_is_refused() -> TestResult {
    let workspace = Workspace::new()?;
    let digests = workspace.dir.path().join("digests.json");
    let manifest = json!({
        "signer": "CN=Demo",
        "digests": { "features/org.demo_1.0.0.jar": "00" },
    });
    fs::write(&digests, serde_json::to_vec(&manifest)?)?;

    workspace.install("org.demo")?
        .arg("--digests")
        .arg(&digests)
        .arg("--trust")
        .arg("always")
        .assert()
        .failure()
        .stderr(predicate::str::contains("refused"));
    assert!(!workspace.site().join("features").join("org.demo_1.0.0").exists());
    Ok(())
}

#[test]
fn test_preserve_unknown_configuration_fails() -> TestResult {
    let workspace = Workspace::new()?;
    workspace.depot()?
        .args(["preserve", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Preserved configuration 1"));
    workspace.depot()?
        .args(["preserve", "9"])
        .assert()
        .failure();
    Ok(())
}
