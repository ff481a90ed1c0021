#![cfg(test)]

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::event::dispatcher::sync_typed_handler;
use crate::event::{Event, EventResult, SiteEvent};
use crate::install::InstallError;
use crate::kernel::bootstrap::Application;
use crate::kernel::error::{Error, Result};
use crate::model::{Feature, PluginEntry};
use crate::monitor::NullProgressMonitor;
use crate::storage::DepotConfig;
use crate::tests::integration::common::{vid, write_jar};
use crate::verification::{sha256_hex, DigestManifest, ListenerChoice, VerificationCode, VerificationResult};

const SIGNER: &str = "CN=Example Release";

/// Serves archives over HTTP and keeps the digest of each one.
struct HttpUpdateSite {
    server: MockServer,
    manifest: DigestManifest,
}

impl HttpUpdateSite {
    async fn start() -> Self {
        Self { server: MockServer::start().await, manifest: DigestManifest::new(SIGNER) }
    }

    async fn serve(&mut self, relative: &str, entries: &[(&str, &[u8])]) {
        let dir = tempdir().expect("Failed to create temp directory");
        let jar = dir.path().join("archive.jar");
        write_jar(&jar, entries);
        let bytes = fs::read(&jar).expect("read jar");
        let digest = sha256_hex(bytes.as_slice()).expect("digest");
        self.manifest.digests.insert(relative.to_string(), digest);
        Mock::given(method("GET"))
            .and(path(format!("/{}", relative)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
            .mount(&self.server)
            .await;
    }

    async fn publish(&mut self, feature: &Feature) {
        let manifest = serde_json::to_vec(feature).expect("feature json");
        self.serve(&format!("features/{}.jar", feature.identifier), &[("feature.json", &manifest)]).await;
        for plugin in &feature.plugins {
            let descriptor = format!("id={}\n", plugin.identifier.id);
            self.serve(&format!("plugins/{}.jar", plugin.identifier), &[("plugin.properties", descriptor.as_bytes())])
                .await;
        }
    }

    fn location(&self) -> String {
        format!("{}/", self.server.uri())
    }
}

fn web_feature() -> Feature {
    Feature::new(vid("org.example.web", "1.0.0"))
        .with_plugin(PluginEntry::new(vid("org.example.http", "1.0.0")))
        .with_plugin(PluginEntry::new(vid("org.example.web.ui", "1.0.0")).unpacked())
}

fn mail_feature() -> Feature {
    Feature::new(vid("org.example.mail", "1.0.0"))
        .with_plugin(PluginEntry::new(vid("org.example.http", "1.0.0")))
        .with_plugin(PluginEntry::new(vid("org.example.mail.core", "1.0.0")))
}

#[tokio::test]
async fn test_http_install_trusts_signer_for_the_process() -> Result<()> {
    let mut update_site = HttpUpdateSite::start().await;
    update_site.publish(&web_feature()).await;
    update_site.publish(&mail_feature()).await;

    let site_dir = tempdir()?;
    let app = Application::new(DepotConfig::default())?;
    app.start().await?;
    let site = app.open_site(site_dir.path()).await?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    app.events()
        .register_type_handler::<SiteEvent>(sync_typed_handler(move |event: &SiteEvent| {
            if let Ok(mut names) = recorder.lock() {
                names.push(event.name());
            }
            EventResult::Continue
        }))
        .await;

    let prompts = Arc::new(AtomicUsize::new(0));
    let counter = prompts.clone();
    let listener = move |_: &VerificationResult| {
        counter.fetch_add(1, Ordering::SeqCst);
        ListenerChoice::TrustAlways
    };

    let provider = app.verified_provider(&update_site.location(), update_site.manifest.clone())?;
    site.install(&web_feature(), &provider, &listener, &NullProgressMonitor::new()).await?;
    // Only the first signed archive reaches the listener
    assert_eq!(prompts.load(Ordering::SeqCst), 1);
    assert!(app.trust_store().contains(SIGNER));

    let plugins = site_dir.path().join("plugins");
    assert!(plugins.join("org.example.http_1.0.0.jar").is_file());
    assert!(plugins.join("org.example.web.ui_1.0.0").join("plugin.properties").is_file());

    // A second provider shares the trust store: no prompt at all
    let provider = app.verified_provider(&update_site.location(), update_site.manifest.clone())?;
    site.install(&mail_feature(), &provider, &listener, &NullProgressMonitor::new()).await?;
    assert_eq!(prompts.load(Ordering::SeqCst), 1);
    assert_eq!(site.plugins().await.len(), 3);

    let history = site.configuration_history()?;
    assert_eq!(history.len(), 3);
    let current = site.current_configuration()?;
    assert!(current.is_configured(site.root(), &vid("org.example.web", "1.0.0")));
    assert!(current.is_configured(site.root(), &vid("org.example.mail", "1.0.0")));

    let names = seen.lock().map(|names| names.clone()).unwrap_or_default();
    assert_eq!(
        names,
        vec![
            SiteEvent::FEATURE_INSTALLED,
            SiteEvent::CONFIGURATION_ADDED,
            SiteEvent::FEATURE_INSTALLED,
            SiteEvent::CONFIGURATION_ADDED,
        ]
    );

    app.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_http_install_refuses_tampered_plugin() -> Result<()> {
    let mut update_site = HttpUpdateSite::start().await;
    update_site.publish(&web_feature()).await;
    let manifest = update_site.manifest.clone().with_digest("plugins/org.example.web.ui_1.0.0.jar", "00ff");

    let site_dir = tempdir()?;
    let app = Application::new(DepotConfig::default())?;
    let site = app.open_site(site_dir.path()).await?;
    let provider = app.verified_provider(&update_site.location(), manifest)?;
    let listener = |result: &VerificationResult| match result.code {
        VerificationCode::Corrupted => ListenerChoice::Error,
        _ => ListenerChoice::TrustOnce,
    };

    let err = site
        .install(&web_feature(), &provider, &listener, &NullProgressMonitor::new())
        .await
        .unwrap_err();
    match err {
        Error::Install(InstallError::Failed { cause, .. }) => {
            assert!(matches!(*cause, Error::Install(InstallError::Verification { .. })), "unexpected cause: {}", cause);
        }
        other => panic!("expected a failed install, got {}", other),
    }

    // TrustOnce leaves nothing behind in the shared store
    assert!(app.trust_store().is_empty());
    assert!(site.features().await.is_empty());
    assert!(!site_dir.path().join("plugins").join("org.example.http_1.0.0.jar").exists());
    assert_eq!(site.configuration_history()?.len(), 1);
    Ok(())
}
