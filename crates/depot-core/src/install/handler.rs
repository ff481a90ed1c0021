use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use url::Url;

use crate::content::consumer::FeatureContentConsumer;
use crate::content::reference::ContentReference;
use crate::install::error::InstallError;
use crate::kernel::error::Result;
use crate::model::{Feature, InstallHandlerEntry, NonPluginEntry, PluginEntry, VersionedIdentifier};
use crate::verification::VerificationListener;

/// Name of the handler used by features that do not name one
pub const DEFAULT_HANDLER: &str = "default";

/// Handler placing non-plugin data under the site's data directory
pub const DATA_PLACEMENT_HANDLER: &str = "data-placement";

/// Fetched archives of one accepted non-plugin entry.
#[derive(Debug, Clone)]
pub struct NonPluginDownload {
    pub entry: NonPluginEntry,
    pub references: Vec<ContentReference>,
}

/// Feature-specific hooks around install, configure, unconfigure and uninstall.
///
/// Every hook defaults to doing nothing. An error from any hook aborts the
/// transaction it belongs to.
#[async_trait]
pub trait InstallHandler: Send + Sync + Debug {
    async fn install_initiated(&mut self) -> Result<()> {
        Ok(())
    }

    async fn plugins_downloaded(&mut self, _plugins: &[PluginEntry]) -> Result<()> {
        Ok(())
    }

    /// Whether the data of `entry` should be downloaded at all.
    fn accept_non_plugin_data(&self, _entry: &NonPluginEntry) -> bool {
        false
    }

    async fn non_plugin_data_downloaded(
        &mut self,
        _downloads: &[NonPluginDownload],
        _listener: &dyn VerificationListener,
    ) -> Result<()> {
        Ok(())
    }

    /// Last chance to store extra content before the consumer commits.
    async fn complete_install(&mut self, _consumer: &mut dyn FeatureContentConsumer) -> Result<()> {
        Ok(())
    }

    async fn install_completed(&mut self, _success: bool) -> Result<()> {
        Ok(())
    }

    async fn configure_initiated(&mut self) -> Result<()> {
        Ok(())
    }

    async fn complete_configure(&mut self) -> Result<()> {
        Ok(())
    }

    async fn configure_completed(&mut self, _success: bool) -> Result<()> {
        Ok(())
    }

    async fn unconfigure_initiated(&mut self) -> Result<()> {
        Ok(())
    }

    async fn complete_unconfigure(&mut self) -> Result<()> {
        Ok(())
    }

    async fn unconfigure_completed(&mut self, _success: bool) -> Result<()> {
        Ok(())
    }

    async fn uninstall_initiated(&mut self) -> Result<()> {
        Ok(())
    }

    async fn complete_uninstall(&mut self) -> Result<()> {
        Ok(())
    }

    async fn uninstall_completed(&mut self, _success: bool) -> Result<()> {
        Ok(())
    }
}

/// What a handler factory knows about the feature it serves.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub feature: VersionedIdentifier,
    pub site: Option<Url>,
    pub argument: Option<String>,
}

impl HandlerContext {
    pub fn for_feature(feature: &Feature) -> Self {
        Self {
            feature: feature.identifier.clone(),
            site: feature.site().cloned(),
            argument: feature.install_handler.as_ref().and_then(|h| h.argument.clone()),
        }
    }
}

/// Handler with no behaviour of its own.
#[derive(Debug, Default)]
pub struct DefaultInstallHandler;

impl InstallHandler for DefaultInstallHandler {}

/// Accepts all non-plugin data and stores it through the feature's consumer.
#[derive(Debug, Default)]
pub struct DataPlacementHandler {
    downloads: Vec<NonPluginDownload>,
}

#[async_trait]
impl InstallHandler for DataPlacementHandler {
    fn accept_non_plugin_data(&self, _entry: &NonPluginEntry) -> bool {
        true
    }

    async fn non_plugin_data_downloaded(
        &mut self,
        downloads: &[NonPluginDownload],
        _listener: &dyn VerificationListener,
    ) -> Result<()> {
        self.downloads = downloads.to_vec();
        Ok(())
    }

    async fn complete_install(&mut self, consumer: &mut dyn FeatureContentConsumer) -> Result<()> {
        for download in &self.downloads {
            let mut data = consumer.open_non_plugin(&download.entry)?;
            for reference in &download.references {
                data.store(reference)?;
            }
            data.close()?;
            log::debug!("Placed non-plugin data '{}'", download.entry.identifier);
        }
        Ok(())
    }
}

pub type HandlerFactory = Arc<dyn Fn(&HandlerContext) -> Box<dyn InstallHandler> + Send + Sync>;

/// Install handlers by name, populated at startup.
pub struct HandlerRegistry {
    factories: RwLock<HashMap<String, HandlerFactory>>,
}

impl HandlerRegistry {
    /// A registry with no handlers at all.
    pub fn empty() -> Self {
        Self { factories: RwLock::new(HashMap::new()) }
    }

    /// A registry holding `default` and `data-placement`.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.register(DEFAULT_HANDLER, |_| Box::new(DefaultInstallHandler));
        registry.register(DATA_PLACEMENT_HANDLER, |_| Box::new(DataPlacementHandler::default()));
        registry
    }

    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn(&HandlerContext) -> Box<dyn InstallHandler> + Send + Sync + 'static,
    {
        if let Ok(mut factories) = self.factories.write() {
            log::debug!("Registering install handler '{}'", name);
            factories.insert(name.to_string(), Arc::new(factory));
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().map(|f| f.contains_key(name)).unwrap_or(false)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// A fresh handler for `feature`; features without an entry get the default handler.
    pub fn create_for(&self, feature: &Feature) -> std::result::Result<Box<dyn InstallHandler>, InstallError> {
        self.create(feature.install_handler.as_ref(), &HandlerContext::for_feature(feature))
    }

    pub fn create(
        &self,
        entry: Option<&InstallHandlerEntry>,
        context: &HandlerContext,
    ) -> std::result::Result<Box<dyn InstallHandler>, InstallError> {
        let name = entry.map(|e| e.handler.as_str()).unwrap_or(DEFAULT_HANDLER);
        let factory = self.factories.read()
            .ok()
            .and_then(|f| f.get(name).cloned())
            .ok_or_else(|| InstallError::UnknownHandler(name.to_string()))?;
        Ok(factory(context))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
