use crate::content::consumer::FeatureContentConsumer;
use crate::content::provider::FeatureContentProvider;
use crate::content::reference::ContentReference;
use crate::install::error::InstallError;
use crate::install::handler::{HandlerRegistry, InstallHandler, NonPluginDownload};
use crate::install::state::{InstallState, InstallTransaction};
use crate::kernel::error::{Error, Result};
use crate::model::{Environment, Feature, FeatureReference, NonPluginEntry, PluginEntry, VersionedIdentifier};
use crate::monitor::ProgressMonitor;
use crate::site::bookkeeping::plugin_delta;
use crate::verification::{ListenerChoice, VerificationCode, VerificationListener};

/// Where an install transaction writes to.
pub trait InstallTarget: Send + Sync {
    /// Plugins already present
    fn plugins(&self) -> Vec<PluginEntry>;

    /// The installed copy of a feature, if any
    fn installed_feature(&self, identifier: &VersionedIdentifier) -> Option<FeatureReference>;

    /// A fresh consumer for one transaction.
    fn create_consumer(&self, feature: &Feature) -> Result<Box<dyn FeatureContentConsumer>>;
}

/// Number of progress units an install of this shape reports.
pub fn install_work(plugins: usize, non_plugins: usize) -> u64 {
    (2 + 2 * plugins + non_plugins + 1) as u64
}

/// Content fetched and verified, ready to store.
struct Staged {
    feature_files: Vec<ContentReference>,
    plugins: Vec<(PluginEntry, Vec<ContentReference>)>,
}

/// Runs install transactions: fetch, verify, store, commit or unwind.
#[derive(Debug)]
pub struct FeatureInstaller<'a> {
    handlers: &'a HandlerRegistry,
    environment: &'a Environment,
}

impl<'a> FeatureInstaller<'a> {
    pub fn new(handlers: &'a HandlerRegistry, environment: &'a Environment) -> Self {
        Self { handlers, environment }
    }

    /// Install `source` from `provider` into `target`.
    ///
    /// Only plugins missing from the target are fetched and stored. Any failure
    /// aborts the target's consumer and is reported as [`InstallError::Failed`]
    /// carrying the first error.
    pub async fn install(
        &self,
        source: &Feature,
        provider: &dyn FeatureContentProvider,
        target: &dyn InstallTarget,
        listener: &dyn VerificationListener,
        monitor: &dyn ProgressMonitor,
    ) -> Result<FeatureReference> {
        let feature = source.identifier.to_string();
        let mut handler = self.handlers.create_for(source)?;
        let plugins = plugin_delta(&source.plugin_entries_for(self.environment), &target.plugins());
        let non_plugins = source.non_plugin_entries_for(self.environment);

        log::info!(
            "Installing {} from {} ({} new plugin(s), {} data entr(ies))",
            feature, provider.url(), plugins.len(), non_plugins.len()
        );
        monitor.begin_task(&format!("Installing {}", source.display_name()), install_work(plugins.len(), non_plugins.len()));

        let mut transaction = InstallTransaction::new(feature.clone());
        let mut consumer: Option<Box<dyn FeatureContentConsumer>> = None;
        let outcome = self
            .run(&mut transaction, source, &plugins, &non_plugins, provider, target, listener, monitor, handler.as_mut(), &mut consumer)
            .await;

        let committed = match (outcome, consumer.as_mut()) {
            (Ok(existing), Some(consumer)) => consumer.close().map(|stored| existing.unwrap_or(stored)),
            (Ok(_), None) => Err(Error::Other(format!("no consumer was opened for {}", feature))),
            (Err(e), _) => Err(e),
        };

        match committed {
            Ok(reference) => {
                transaction.advance(InstallState::Committed)?;
                monitor.worked(1);
                if let Err(e) = handler.install_completed(true).await {
                    log::warn!("Install handler of {} failed after commit: {}", feature, e);
                }
                monitor.done();
                log::info!("Installed {} at {}", feature, reference.location.display());
                Ok(reference)
            }
            Err(cause) => {
                log::warn!("Install of {} failed in {}: {}", feature, transaction.state(), cause);
                let _ = transaction.advance(InstallState::Aborted);
                let unwind = unwind(&mut consumer, handler.as_mut()).await;
                monitor.done();
                Err(InstallError::Failed {
                    feature,
                    cause: Box::new(cause),
                    unwind: unwind.map(Box::new),
                }.into())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        transaction: &mut InstallTransaction,
        source: &Feature,
        plugins: &[PluginEntry],
        non_plugins: &[NonPluginEntry],
        provider: &dyn FeatureContentProvider,
        target: &dyn InstallTarget,
        listener: &dyn VerificationListener,
        monitor: &dyn ProgressMonitor,
        handler: &mut dyn InstallHandler,
        consumer: &mut Option<Box<dyn FeatureContentConsumer>>,
    ) -> Result<Option<FeatureReference>> {
        check_canceled(monitor)?;
        handler.install_initiated().await?;

        let existing = target.installed_feature(&source.identifier);
        let staged = self.fetch(transaction, source, plugins, provider, listener, monitor, existing.is_some()).await?;

        transaction.advance(InstallState::FetchNonPluginData)?;
        handler.plugins_downloaded(plugins).await?;
        let mut downloads = Vec::new();
        for entry in non_plugins {
            if handler.accept_non_plugin_data(entry) {
                monitor.sub_task(&format!("Downloading {}", entry.identifier));
                let references = provider.non_plugin_archive_references(source, entry, monitor).await?;
                downloads.push(NonPluginDownload { entry: entry.clone(), references });
            }
            tick(monitor)?;
        }
        if !downloads.is_empty() {
            handler.non_plugin_data_downloaded(&downloads, listener).await?;
        }

        transaction.advance(InstallState::Store)?;
        let consumer = consumer.insert(target.create_consumer(source)?);
        for reference in &staged.feature_files {
            consumer.store(reference)?;
        }
        for (plugin, references) in &staged.plugins {
            check_canceled(monitor)?;
            let mut entry_consumer = consumer.open_plugin(plugin)?;
            for reference in references {
                entry_consumer.store(reference)?;
            }
            entry_consumer.close()?;
        }

        transaction.advance(InstallState::HandlerComplete)?;
        handler.complete_install(consumer.as_mut()).await?;
        Ok(existing)
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch(
        &self,
        transaction: &mut InstallTransaction,
        source: &Feature,
        plugins: &[PluginEntry],
        provider: &dyn FeatureContentProvider,
        listener: &dyn VerificationListener,
        monitor: &dyn ProgressMonitor,
        feature_installed: bool,
    ) -> Result<Staged> {
        transaction.advance(InstallState::FetchFeatureArchive)?;
        monitor.sub_task(&format!("Downloading {}", source.identifier));
        let archives = provider.feature_archive_references(source, monitor).await?;
        tick(monitor)?;

        transaction.advance(InstallState::VerifyFeature)?;
        verify(provider, source, &archives, true, listener, monitor)?;
        let feature_files = if feature_installed {
            log::debug!("{} is already installed, only plugins will be stored", source.identifier);
            Vec::new()
        } else {
            provider.feature_content_references(source, monitor).await?
        };
        tick(monitor)?;

        let mut staged = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            transaction.advance(InstallState::FetchPlugins)?;
            monitor.sub_task(&format!("Downloading {}", plugin.identifier));
            let archives = provider.plugin_archive_references(source, plugin, monitor).await?;
            tick(monitor)?;

            transaction.advance(InstallState::VerifyPlugins)?;
            verify(provider, source, &archives, false, listener, monitor)?;
            let references = if plugin.unpack {
                provider.plugin_content_references(source, plugin, monitor).await?
            } else {
                archives
            };
            staged.push((plugin.clone(), references));
            tick(monitor)?;
        }

        Ok(Staged { feature_files, plugins: staged })
    }
}

/// Ask the provider's verifier about each reference and settle the answer.
fn verify(
    provider: &dyn FeatureContentProvider,
    feature: &Feature,
    references: &[ContentReference],
    is_feature: bool,
    listener: &dyn VerificationListener,
    monitor: &dyn ProgressMonitor,
) -> Result<()> {
    let Some(verifier) = provider.verifier() else {
        return Ok(());
    };
    for reference in references {
        let Some(result) = verifier.verify(feature, reference, is_feature, monitor)? else {
            continue;
        };
        let intact = !matches!(result.code, VerificationCode::Corrupted | VerificationCode::Error);
        if intact && result.signer.as_deref().is_some_and(|signer| verifier.is_trusted(signer)) {
            continue;
        }
        match listener.prompt(&result) {
            ListenerChoice::Abort => return Err(InstallError::Aborted { result: Box::new(result) }.into()),
            ListenerChoice::Error => return Err(InstallError::Verification { result: Box::new(result) }.into()),
            ListenerChoice::TrustOnce => log::info!("Accepted {} once", result.reference),
            ListenerChoice::TrustAlways => {
                if let Some(signer) = &result.signer {
                    verifier.remember_trusted(signer);
                }
            }
        }
    }
    Ok(())
}

/// Undo a failed transaction. Returns the first cleanup failure.
async fn unwind(consumer: &mut Option<Box<dyn FeatureContentConsumer>>, handler: &mut dyn InstallHandler) -> Option<Error> {
    let mut failure = None;
    if let Some(consumer) = consumer.as_mut() {
        if let Err(e) = consumer.abort() {
            log::warn!("Abort failed: {}", e);
            failure = Some(e);
        }
    }
    if let Err(e) = handler.install_completed(false).await {
        log::warn!("Install handler failed while unwinding: {}", e);
        failure.get_or_insert(e);
    }
    failure
}

fn check_canceled(monitor: &dyn ProgressMonitor) -> Result<()> {
    if monitor.is_canceled() {
        return Err(InstallError::Canceled.into());
    }
    Ok(())
}

fn tick(monitor: &dyn ProgressMonitor) -> Result<()> {
    monitor.worked(1);
    check_canceled(monitor)
}
