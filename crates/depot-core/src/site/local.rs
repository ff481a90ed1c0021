use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock as StdRwLock};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::content::provider::FeatureContentProvider;
use crate::event::{SharedEventDispatcher, SiteEvent};
use crate::install::error::InstallError;
use crate::install::handler::{HandlerRegistry, InstallHandler};
use crate::install::orchestrator::FeatureInstaller;
use crate::kernel::component::KernelComponent;
use crate::kernel::constants::{DATA_DIR, DEFAULT_HISTORY_SIZE, HISTORY_FILE_NAME, METADATA_DIR_NAME, SITE_FILE_NAME};
use crate::kernel::error::{Error, Result};
use crate::model::{Environment, Feature, FeatureImport, FeatureReference, NonPluginEntry, PluginEntry, VersionedIdentifier};
use crate::monitor::ProgressMonitor;
use crate::site::bookkeeping::{plugin_delta, plugins_only_referenced_by, unsatisfied_imports};
use crate::site::configuration::{Activity, ActivityAction, InstallConfiguration};
use crate::site::error::SiteError;
use crate::site::history::ConfigurationHistory;
use crate::site::site::Site;
use crate::storage::{LocalStorageProvider, MetadataStore, StorageProvider};
use crate::verification::VerificationListener;

/// Shared services a local site works with.
#[derive(Debug, Clone)]
pub struct SiteServices {
    pub handlers: Arc<HandlerRegistry>,
    pub environment: Environment,
    pub history_size: usize,
    pub events: SharedEventDispatcher,
}

impl Default for SiteServices {
    fn default() -> Self {
        Self {
            handlers: Arc::new(HandlerRegistry::with_builtins()),
            environment: Environment::current(),
            history_size: DEFAULT_HISTORY_SIZE,
            events: SharedEventDispatcher::new(),
        }
    }
}

/// A site directory on this machine together with its configuration history.
///
/// Installs and removals hold the site's write lock for the whole transaction
/// and release it before any event is published.
/// The history is replaced wholesale on every change; [`configuration_history`]
/// hands out the snapshot current at the time of the call.
///
/// [`configuration_history`]: LocalSite::configuration_history
#[derive(Debug)]
pub struct LocalSite {
    root: PathBuf,
    site: RwLock<Site>,
    history: StdRwLock<Arc<ConfigurationHistory>>,
    storage: LocalStorageProvider,
    metadata: MetadataStore,
    services: SiteServices,
}

impl LocalSite {
    /// Open the site at `root`, creating it if needed, and load its saved state.
    pub fn open(root: &Path, services: SiteServices) -> Result<Self> {
        if root.exists() && !root.is_dir() {
            return Err(SiteError::InvalidLocation {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            }
            .into());
        }
        let root = std::path::absolute(root).map_err(|e| SiteError::InvalidLocation {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        let storage = LocalStorageProvider::new(root.clone());
        storage.create_dir_all(Path::new(METADATA_DIR_NAME))?;
        let metadata = MetadataStore::new(Arc::new(storage.clone()), METADATA_DIR_NAME);

        let site = metadata
            .load::<Site>(SITE_FILE_NAME)?
            .unwrap_or_default()
            .attach(root.clone())?;
        let history = match metadata.load::<ConfigurationHistory>(HISTORY_FILE_NAME)? {
            Some(history) => history.with_capacity(services.history_size),
            None => {
                let mut initial = InstallConfiguration::new("Initial configuration");
                initial.set_configured(&root, site.features().iter().map(|f| f.identifier.clone()).collect());
                initial.record(Activity::new(ActivityAction::ConfigurationAdded, "Site created"));
                let (history, _) = ConfigurationHistory::new(services.history_size).with_configuration(initial);
                metadata.save(HISTORY_FILE_NAME, &history)?;
                history
            }
        };
        log::info!(
            "Opened site {} ({} feature(s), {} configuration(s))",
            root.display(), site.features().len(), history.len()
        );

        Ok(Self {
            root,
            site: RwLock::new(site),
            history: StdRwLock::new(Arc::new(history)),
            storage,
            metadata,
            services,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn events(&self) -> &SharedEventDispatcher {
        &self.services.events
    }

    /// Install `feature` from `provider` and configure it in a new current configuration.
    pub async fn install(
        &self,
        feature: &Feature,
        provider: &dyn FeatureContentProvider,
        listener: &dyn VerificationListener,
        monitor: &dyn ProgressMonitor,
    ) -> Result<FeatureReference> {
        let id = feature.identifier.clone();
        let mut site = self.site.write().await;
        for import in unsatisfied_imports(feature, &site) {
            log::warn!("{} requires {} which is not installed on {}", id, import, self.root.display());
        }
        let installer = FeatureInstaller::new(&self.services.handlers, &self.services.environment);
        let outcome = installer.install(feature, provider, &*site, listener, monitor).await;
        let reference = match outcome {
            Ok(reference) => reference,
            Err(e) => {
                drop(site);
                self.record_failure(ActivityAction::FeatureInstalled, &id);
                self.publish(SiteEvent::InstallFailed {
                    site: self.root.clone(),
                    feature: id,
                    reason: e.to_string(),
                })
                .await;
                return Err(e);
            }
        };

        if site.adopt(feature)? {
            self.metadata.save(SITE_FILE_NAME, &*site)?;
        }
        let configuration = self.update_history(|history| {
            let current = current_of(history)?;
            let mut next = current.successor(format!("Installed {}", feature.display_name()));
            next.configure(&self.root, id.clone());
            next.record(Activity::new(ActivityAction::FeatureInstalled, id.to_string()));
            Ok(history.with_configuration(next))
        })?;
        drop(site);

        self.publish(SiteEvent::FeatureInstalled { site: self.root.clone(), feature: id }).await;
        self.publish(SiteEvent::ConfigurationAdded { site: self.root.clone(), configuration }).await;
        Ok(reference)
    }

    /// Unconfigure (when configured) and uninstall a feature.
    ///
    /// Only plugins no other installed feature references are deleted.
    pub async fn remove(&self, feature: &VersionedIdentifier, monitor: &dyn ProgressMonitor) -> Result<()> {
        let mut site = self.site.write().await;
        let installed = site
            .feature(feature)
            .cloned()
            .ok_or_else(|| SiteError::UnknownFeature(feature.to_string()))?;
        let mut handler = self.services.handlers.create_for(&installed)?;
        let was_configured = self.is_configured(feature)?;
        let orphans = plugins_only_referenced_by(&site, feature);

        monitor.begin_task(&format!("Removing {}", installed.display_name()), orphans.len() as u64 + 2);
        if monitor.is_canceled() {
            monitor.done();
            return Err(InstallError::Canceled.into());
        }
        if was_configured {
            let outcome = unconfigure_hooks(handler.as_mut()).await;
            let reported = handler.unconfigure_completed(outcome.is_ok()).await;
            if let Err(e) = settle(outcome, reported) {
                monitor.done();
                drop(site);
                self.record_failure(ActivityAction::FeatureRemoved, feature);
                return Err(e);
            }
        }

        let outcome = self.uninstall(handler.as_mut(), feature, &orphans, monitor).await;
        let reported = handler.uninstall_completed(outcome.is_ok()).await;
        monitor.done();
        if let Err(e) = settle(outcome, reported) {
            drop(site);
            if was_configured {
                self.keep_unconfigured(&installed, feature).await;
            } else {
                self.record_failure(ActivityAction::FeatureRemoved, feature);
            }
            return Err(e);
        }

        site.forget(feature);
        self.metadata.save(SITE_FILE_NAME, &*site)?;
        let configuration = self.update_history(|history| {
            let current = current_of(history)?;
            let mut next = current.successor(format!("Removed {}", installed.display_name()));
            if next.unconfigure(&self.root, feature) {
                next.record(Activity::new(ActivityAction::FeatureUnconfigured, feature.to_string()));
            }
            next.record(Activity::new(ActivityAction::FeatureRemoved, feature.to_string()));
            Ok(history.with_configuration(next))
        })?;
        drop(site);

        log::info!("Removed {} and {} unshared plugin(s)", feature, orphans.len());
        if was_configured {
            self.publish(SiteEvent::FeatureUnconfigured { site: self.root.clone(), feature: feature.clone() }).await;
        }
        self.publish(SiteEvent::FeatureRemoved { site: self.root.clone(), feature: feature.clone() }).await;
        self.publish(SiteEvent::ConfigurationAdded { site: self.root.clone(), configuration }).await;
        Ok(())
    }

    /// Commit the unconfigure of a feature whose uninstall failed after its
    /// unconfigure hooks had already run.
    async fn keep_unconfigured(&self, installed: &Feature, feature: &VersionedIdentifier) {
        let committed = self.update_history(|history| {
            let mut next = current_of(history)?.successor(format!("Unconfigured {}", installed.display_name()));
            next.unconfigure(&self.root, feature);
            next.record(Activity::new(ActivityAction::FeatureUnconfigured, feature.to_string()));
            next.record(Activity::new(ActivityAction::FeatureRemoved, feature.to_string()).failed());
            Ok(history.with_configuration(next))
        });
        match committed {
            Ok(configuration) => {
                self.publish(SiteEvent::FeatureUnconfigured { site: self.root.clone(), feature: feature.clone() }).await;
                self.publish(SiteEvent::ConfigurationAdded { site: self.root.clone(), configuration }).await;
            }
            Err(e) => log::warn!("Could not record unconfigure of {}: {}", feature, e),
        }
    }

    /// Note a failed action on the current configuration. Failing to do so is only logged.
    fn record_failure(&self, action: ActivityAction, feature: &VersionedIdentifier) {
        let activity = Activity::new(action, feature.to_string()).failed();
        if let Err(e) = self.update_history(|history| Ok(history.with_activity(activity)?)) {
            log::warn!("Could not record failed {} of {}: {}", action, feature, e);
        }
    }

    async fn uninstall(
        &self,
        handler: &mut dyn InstallHandler,
        feature: &VersionedIdentifier,
        orphans: &[PluginEntry],
        monitor: &dyn ProgressMonitor,
    ) -> Result<()> {
        handler.uninstall_initiated().await?;
        self.delete(&Site::feature_path(feature))?;
        self.delete(&Path::new(DATA_DIR).join(feature.to_string()))?;
        monitor.worked(1);
        for plugin in orphans {
            self.delete(&Site::plugin_path(plugin))?;
            monitor.worked(1);
        }
        handler.complete_uninstall().await?;
        monitor.worked(1);
        Ok(())
    }

    fn delete(&self, relative: &Path) -> Result<()> {
        if self.storage.is_dir(relative) {
            self.storage.remove_dir_all(relative)?;
        } else if self.storage.is_file(relative) {
            self.storage.remove_file(relative)?;
        } else {
            return Ok(());
        }
        log::debug!("Deleted {}", relative.display());
        Ok(())
    }

    /// Configure an installed feature in a new current configuration.
    pub async fn configure(&self, feature: &VersionedIdentifier) -> Result<InstallConfiguration> {
        let site = self.site.write().await;
        let installed = site.feature(feature).ok_or_else(|| SiteError::UnknownFeature(feature.to_string()))?;
        if self.is_configured(feature)? {
            return Err(SiteError::AlreadyConfigured(feature.to_string()).into());
        }
        let mut handler = self.services.handlers.create_for(installed)?;
        let outcome = configure_hooks(handler.as_mut()).await;
        let reported = handler.configure_completed(outcome.is_ok()).await;
        settle(outcome, reported)?;

        let configuration = self.update_history(|history| {
            let mut next = current_of(history)?.successor(format!("Configured {}", installed.display_name()));
            next.configure(&self.root, feature.clone());
            next.record(Activity::new(ActivityAction::FeatureConfigured, feature.to_string()));
            Ok(history.with_configuration(next))
        })?;
        drop(site);

        self.publish(SiteEvent::FeatureConfigured { site: self.root.clone(), feature: feature.clone() }).await;
        self.publish(SiteEvent::ConfigurationAdded { site: self.root.clone(), configuration }).await;
        self.configuration(configuration)
    }

    /// Unconfigure an installed feature in a new current configuration. Its files stay.
    pub async fn unconfigure(&self, feature: &VersionedIdentifier) -> Result<InstallConfiguration> {
        let site = self.site.write().await;
        let installed = site.feature(feature).ok_or_else(|| SiteError::UnknownFeature(feature.to_string()))?;
        if !self.is_configured(feature)? {
            return Err(SiteError::NotConfigured(feature.to_string()).into());
        }
        let mut handler = self.services.handlers.create_for(installed)?;
        let outcome = unconfigure_hooks(handler.as_mut()).await;
        let reported = handler.unconfigure_completed(outcome.is_ok()).await;
        settle(outcome, reported)?;

        let configuration = self.update_history(|history| {
            let mut next = current_of(history)?.successor(format!("Unconfigured {}", installed.display_name()));
            next.unconfigure(&self.root, feature);
            next.record(Activity::new(ActivityAction::FeatureUnconfigured, feature.to_string()));
            Ok(history.with_configuration(next))
        })?;
        drop(site);

        self.publish(SiteEvent::FeatureUnconfigured { site: self.root.clone(), feature: feature.clone() }).await;
        self.publish(SiteEvent::ConfigurationAdded { site: self.root.clone(), configuration }).await;
        self.configuration(configuration)
    }

    /// The history as of now. Later changes do not affect the returned snapshot.
    pub fn configuration_history(&self) -> Result<Arc<ConfigurationHistory>> {
        self.history
            .read()
            .map(|history| history.clone())
            .map_err(|_| Error::Other("configuration history lock poisoned".to_string()))
    }

    pub fn current_configuration(&self) -> Result<InstallConfiguration> {
        let history = self.configuration_history()?;
        Ok(current_of(&history)?.clone())
    }

    fn configuration(&self, id: u64) -> Result<InstallConfiguration> {
        let history = self.configuration_history()?;
        let configuration = history.get(id).ok_or(SiteError::UnknownConfiguration(id))?;
        Ok(configuration.clone())
    }

    fn is_configured(&self, feature: &VersionedIdentifier) -> Result<bool> {
        Ok(self.current_configuration()?.is_configured(&self.root, feature))
    }

    /// Append `configuration` as the new current configuration.
    pub async fn add_configuration(&self, configuration: InstallConfiguration) -> Result<InstallConfiguration> {
        let id = self.update_history(|history| {
            let mut configuration = configuration;
            configuration.record(Activity::new(ActivityAction::ConfigurationAdded, configuration.label.clone()));
            Ok(history.with_configuration(configuration))
        })?;
        self.publish(SiteEvent::ConfigurationAdded { site: self.root.clone(), configuration: id }).await;
        self.configuration(id)
    }

    /// Make a new current configuration with the features configured in `id`.
    ///
    /// Features no longer installed are left out. Nothing is removed from the history.
    pub async fn revert_to(&self, id: u64) -> Result<InstallConfiguration> {
        let site = self.site.read().await;
        let from = self.current_configuration()?.id;
        let configuration = self.update_history(|history| {
            let target = history.get(id).ok_or(SiteError::UnknownConfiguration(id))?;
            let features: BTreeSet<VersionedIdentifier> = target
                .configured_features(&self.root)
                .into_iter()
                .filter(|feature| site.contains(feature))
                .collect();
            let mut next = current_of(history)?.successor(format!("Reverted to {}", target.label));
            next.set_configured(&self.root, features);
            next.record(Activity::new(ActivityAction::Reverted, format!("configuration {}", id)));
            Ok(history.with_configuration(next))
        })?;
        drop(site);

        log::info!("Reverted {} to configuration {}", self.root.display(), id);
        self.publish(SiteEvent::Reverted { site: self.root.clone(), from, configuration }).await;
        self.configuration(configuration)
    }

    /// Keep a configuration out of eviction.
    pub fn preserve(&self, id: u64) -> Result<()> {
        self.update_history(|history| Ok((history.with_preserved(id, true)?, id)))
            .map(|_| ())
    }

    pub fn unpreserve(&self, id: u64) -> Result<()> {
        self.update_history(|history| Ok((history.with_preserved(id, false)?, id)))
            .map(|_| ())
    }

    /// Build, persist and publish the next history snapshot.
    fn update_history<F>(&self, change: F) -> Result<u64>
    where
        F: FnOnce(&ConfigurationHistory) -> Result<(ConfigurationHistory, u64)>,
    {
        let mut history = self
            .history
            .write()
            .map_err(|_| Error::Other("configuration history lock poisoned".to_string()))?;
        let (next, id) = change(&history)?;
        self.metadata.save(HISTORY_FILE_NAME, &next)?;
        *history = Arc::new(next);
        Ok(id)
    }

    pub async fn features(&self) -> Vec<Feature> {
        self.site.read().await.features().to_vec()
    }

    pub async fn plugins(&self) -> Vec<PluginEntry> {
        self.site.read().await.plugins()
    }

    /// Plugins of `feature` that removing it would delete.
    pub async fn plugins_only_referenced_by(&self, feature: &VersionedIdentifier) -> Vec<PluginEntry> {
        plugins_only_referenced_by(&*self.site.read().await, feature)
    }

    /// Imports of `feature` no installed plugin satisfies.
    pub async fn unsatisfied_imports(&self, feature: &Feature) -> Vec<FeatureImport> {
        unsatisfied_imports(feature, &*self.site.read().await)
    }

    /// Bytes `provider` would download to install `feature` here, or `UNKNOWN_SIZE`.
    pub async fn download_size_for(&self, feature: &Feature, provider: &dyn FeatureContentProvider) -> i64 {
        let (plugins, non_plugins) = self.pending_entries(feature).await;
        provider.download_size_for(&plugins, &non_plugins)
    }

    /// Bytes installing `feature` here would add on disk, or `UNKNOWN_SIZE`.
    pub async fn install_size_for(&self, feature: &Feature, provider: &dyn FeatureContentProvider) -> i64 {
        let (plugins, non_plugins) = self.pending_entries(feature).await;
        provider.install_size_for(&plugins, &non_plugins)
    }

    async fn pending_entries(&self, feature: &Feature) -> (Vec<PluginEntry>, Vec<NonPluginEntry>) {
        let environment = &self.services.environment;
        let site = self.site.read().await;
        let plugins = plugin_delta(&feature.plugin_entries_for(environment), &site.plugins());
        (plugins, feature.non_plugin_entries_for(environment))
    }

    async fn publish(&self, event: SiteEvent) {
        self.services.events.dispatch(&event).await;
    }

    async fn flush(&self) -> Result<()> {
        let site = self.site.read().await;
        self.metadata.save(SITE_FILE_NAME, &*site)?;
        let history = self.configuration_history()?;
        self.metadata.save(HISTORY_FILE_NAME, history.as_ref())
    }
}

#[async_trait]
impl KernelComponent for LocalSite {
    fn name(&self) -> &'static str {
        "LocalSite"
    }

    async fn start(&self) -> Result<()> {
        log::debug!("Local site {} ready", self.root.display());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.flush().await?;
        log::debug!("Local site {} saved", self.root.display());
        Ok(())
    }
}

fn current_of(history: &ConfigurationHistory) -> Result<&InstallConfiguration> {
    Ok(history.current().ok_or(SiteError::NoCurrentConfiguration)?)
}

async fn configure_hooks(handler: &mut dyn InstallHandler) -> Result<()> {
    handler.configure_initiated().await?;
    handler.complete_configure().await
}

async fn unconfigure_hooks(handler: &mut dyn InstallHandler) -> Result<()> {
    handler.unconfigure_initiated().await?;
    handler.complete_unconfigure().await
}

/// Combine a lifecycle's outcome with what its `*_completed` hook returned.
///
/// The lifecycle's own error wins over one raised by the hook.
fn settle(outcome: Result<()>, reported: Result<()>) -> Result<()> {
    match (outcome, reported) {
        (Err(e), Err(secondary)) => {
            log::warn!("Completion hook failed after an earlier error: {}", secondary);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), reported) => reported,
    }
}
