use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use depot_core::model::Feature;
use depot_core::site::{ConfigurationHistory, InstallConfiguration};
use depot_core::storage::{LocalStorageProvider, StorageProvider};
use depot_core::verification::{ListenerChoice, PolicyListener, VerificationListener, VerificationResult};
use depot_core::{Error, ProgressMonitor, Result};

/// Progress monitor printing task names and a percentage to stderr.
#[derive(Debug, Default)]
pub struct ConsoleMonitor {
    total: AtomicU64,
    worked: AtomicU64,
    canceled: AtomicBool,
}

impl ConsoleMonitor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressMonitor for ConsoleMonitor {
    fn begin_task(&self, name: &str, total_work: u64) {
        self.total.store(total_work, Ordering::SeqCst);
        self.worked.store(0, Ordering::SeqCst);
        eprintln!("{}", name);
    }

    fn worked(&self, work: u64) {
        let done = self.worked.fetch_add(work, Ordering::SeqCst) + work;
        let total = self.total.load(Ordering::SeqCst).max(1);
        eprint!("\r  {:>3}%", (done * 100 / total).min(100));
        let _ = std::io::stderr().flush();
    }

    fn sub_task(&self, name: &str) {
        log::info!("{}", name);
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn set_canceled(&self, canceled: bool) {
        self.canceled.store(canceled, Ordering::SeqCst);
    }

    fn done(&self) {
        eprintln!();
    }
}

/// Policy listener that reports every decision it makes.
#[derive(Debug)]
pub struct ConsoleListener {
    policy: PolicyListener,
}

impl ConsoleListener {
    pub fn new(policy: PolicyListener) -> Self {
        Self { policy }
    }
}

impl VerificationListener for ConsoleListener {
    fn prompt(&self, result: &VerificationResult) -> ListenerChoice {
        let choice = self.policy.prompt(result);
        let verdict = match choice {
            ListenerChoice::Abort => "aborting",
            ListenerChoice::Error => "refused",
            ListenerChoice::TrustOnce => "accepted once",
            ListenerChoice::TrustAlways => "signer trusted",
        };
        eprintln!("verification: {}: {}", result, verdict);
        choice
    }
}

/// Read a JSON feature description.
pub fn load_feature(path: &Path) -> Result<Feature> {
    let data = LocalStorageProvider::new(PathBuf::new()).read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| Error::Other(format!("Invalid feature description {}: {}", path.display(), e)))
}

pub fn print_features(features: &[Feature], current: &InstallConfiguration, site: &Path) {
    if features.is_empty() {
        println!("No features installed.");
        return;
    }
    for feature in features {
        let state = if current.is_configured(site, &feature.identifier) { "configured" } else { "unconfigured" };
        println!(
            "{}  {}  {} plugin(s)  [{}]",
            feature.identifier,
            feature.display_name(),
            feature.plugins.len(),
            state
        );
    }
}

pub fn print_history(history: &ConfigurationHistory, site: &Path) {
    for configuration in history.configurations().iter().rev() {
        println!("{}", configuration);
        for activity in &configuration.activities {
            println!(
                "    {} {} {:?} {}",
                activity.timestamp.format("%Y-%m-%d %H:%M:%S"),
                activity.action,
                activity.status,
                activity.label
            );
        }
        let features: Vec<String> = configuration
            .configured_features(site)
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("    features: {}", if features.is_empty() { "-".to_string() } else { features.join(", ") });
    }
}

pub fn format_size(bytes: i64) -> String {
    if bytes < 0 {
        "unknown".to_string()
    } else {
        format!("{} bytes", bytes)
    }
}
