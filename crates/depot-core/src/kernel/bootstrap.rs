use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::connection::ConnectionManager;
use crate::content::{ArchiveFeatureProvider, ContentCache};
use crate::event::SharedEventDispatcher;
use crate::install::HandlerRegistry;
use crate::kernel::component::KernelComponent;
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::model::Environment;
use crate::site::{LocalSite, SiteServices};
use crate::storage::DepotConfig;
use crate::verification::{ChecksumVerifier, DigestManifest, PolicyListener, TrustStore};

/// One engine instance: the shared services every site and install works with.
///
/// The trust store, content cache and connection manager live as long as the
/// application. Components are started in the order they were added and
/// stopped in reverse.
pub struct Application {
    config: DepotConfig,
    environment: Environment,
    connections: Arc<ConnectionManager>,
    cache: Arc<ContentCache>,
    handlers: Arc<HandlerRegistry>,
    trust: Arc<TrustStore>,
    events: SharedEventDispatcher,
    components: Mutex<Vec<Arc<dyn KernelComponent>>>,
    started: AtomicBool,
}

impl Application {
    pub fn new(config: DepotConfig) -> Result<Self> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);

        let connections = ConnectionManager::new(config.http_timeout(), &config.user_agent)
            .map(Arc::new)
            .map_err(|e| bootstrap_error("ConnectionManager", e.into()))?;
        let cache = match &config.staging_root {
            Some(root) => ContentCache::with_root(root, connections.clone()),
            None => ContentCache::new(connections.clone()),
        }
        .map(Arc::new)
        .map_err(|e| bootstrap_error("ContentCache", e))?;
        log::info!("Staging downloads in {}", cache.root().display());

        let environment = config.environment();
        log::debug!("Environment: {:?}", environment);
        let components: Vec<Arc<dyn KernelComponent>> = vec![connections.clone() as Arc<dyn KernelComponent>];

        Ok(Self {
            config,
            environment,
            connections,
            cache,
            handlers: Arc::new(HandlerRegistry::with_builtins()),
            trust: Arc::new(TrustStore::new()),
            events: SharedEventDispatcher::new(),
            components: Mutex::new(components),
            started: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &DepotConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Install handlers; register custom ones before opening sites.
    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    pub fn trust_store(&self) -> &Arc<TrustStore> {
        &self.trust
    }

    pub fn events(&self) -> &SharedEventDispatcher {
        &self.events
    }

    /// Listener answering prompts with the configured trust policy
    pub fn listener(&self) -> PolicyListener {
        PolicyListener::new(self.config.trust_policy)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Add a component; it is started at once if the application already runs.
    pub async fn register_component(&self, component: Arc<dyn KernelComponent>) -> Result<()> {
        if self.is_started() {
            start_component(component.as_ref()).await?;
        }
        self.components.lock().await.push(component);
        Ok(())
    }

    /// Open a local site wired to this application's services.
    pub async fn open_site(&self, root: &Path) -> Result<Arc<LocalSite>> {
        let services = SiteServices {
            handlers: self.handlers.clone(),
            environment: self.environment.clone(),
            history_size: self.config.history_size,
            events: self.events.clone(),
        };
        let site = Arc::new(LocalSite::open(root, services)?);
        self.register_component(site.clone()).await?;
        Ok(site)
    }

    /// Provider reading from a directory or URL through the shared cache.
    pub fn provider(&self, location: &str) -> Result<ArchiveFeatureProvider> {
        ArchiveFeatureProvider::for_location(location, self.cache.clone())
    }

    /// Provider whose content is checked against `manifest`, trusting signers in the shared store.
    pub fn verified_provider(&self, location: &str, manifest: DigestManifest) -> Result<ArchiveFeatureProvider> {
        let verifier = ChecksumVerifier::new(manifest, self.trust.clone());
        Ok(self.provider(location)?.with_verifier(Arc::new(verifier)))
    }

    pub async fn start(&self) -> Result<()> {
        if self.is_started() {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Start,
                component_name: None,
                message: "Application already started".to_string(),
                source: None,
            });
        }
        log::info!("Starting components...");
        let components = self.components.lock().await;
        for component in components.iter() {
            start_component(component.as_ref()).await?;
        }
        self.started.store(true, Ordering::SeqCst);
        log::info!("Component start complete.");
        Ok(())
    }

    /// Stop all components in reverse order. The first failure is returned.
    pub async fn shutdown(&self) -> Result<()> {
        log::info!("Shutting down components...");
        let components = self.components.lock().await;
        for component in components.iter().rev() {
            log::info!("Stopping component: {}", component.name());
            if let Err(e) = component.stop().await {
                log::error!("Error stopping component {}: {}", component.name(), e);
                return Err(Error::KernelLifecycleError {
                    phase: KernelLifecyclePhase::Shutdown,
                    component_name: Some(component.name().to_string()),
                    message: "Component failed to stop".to_string(),
                    source: Some(Box::new(e)),
                });
            }
        }
        self.started.store(false, Ordering::SeqCst);
        log::info!("Component shutdown complete.");
        Ok(())
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("environment", &self.environment)
            .field("cache", &self.cache.root())
            .field("handlers", &self.handlers)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

async fn start_component(component: &dyn KernelComponent) -> Result<()> {
    log::info!("Starting component: {}", component.name());
    component.start().await.map_err(|e| Error::KernelLifecycleError {
        phase: KernelLifecyclePhase::Start,
        component_name: Some(component.name().to_string()),
        message: "Component failed to start".to_string(),
        source: Some(Box::new(e)),
    })
}

fn bootstrap_error(component: &str, source: Error) -> Error {
    Error::KernelLifecycleError {
        phase: KernelLifecyclePhase::Bootstrap,
        component_name: Some(component.to_string()),
        message: format!("Could not create {}", component),
        source: Some(Box::new(source)),
    }
}
