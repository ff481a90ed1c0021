use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::connection::error::ConnectionError;
use crate::connection::protocol::{FileProtocolHandler, HttpProtocolHandler, ProtocolHandler};
use crate::connection::request::{ConnectionRequest, ConnectionStatus, RequestId};
use crate::kernel::component::KernelComponent;
use crate::kernel::error::Result;

/// Notified exactly once when a request reaches its terminal state.
pub trait ConnectionListener: Send + Sync {
    fn connection_closed(&self, request: &ConnectionRequest);
}

impl<F> ConnectionListener for F
where
    F: Fn(&ConnectionRequest) + Send + Sync,
{
    fn connection_closed(&self, request: &ConnectionRequest) {
        self(request)
    }
}

#[derive(Debug, Default)]
struct LiveRequests {
    closed: bool,
    requests: HashMap<RequestId, Arc<ConnectionRequest>>,
}

/// Registry of in-flight fetches, one worker task per request.
#[derive(Debug)]
pub struct ConnectionManager {
    name: &'static str,
    handlers: RwLock<HashMap<String, Arc<dyn ProtocolHandler>>>,
    live: Arc<Mutex<LiveRequests>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    /// A manager with no protocol handlers registered.
    pub fn empty() -> Self {
        Self {
            name: "ConnectionManager",
            handlers: RwLock::new(HashMap::new()),
            live: Arc::new(Mutex::new(LiveRequests::default())),
            next_id: AtomicU64::new(1),
        }
    }

    /// A manager serving `file`, `http` and `https`.
    pub fn new(timeout: Duration, user_agent: &str) -> std::result::Result<Self, ConnectionError> {
        let mut handlers: HashMap<String, Arc<dyn ProtocolHandler>> = HashMap::new();
        let protocols: [Arc<dyn ProtocolHandler>; 2] = [
            Arc::new(FileProtocolHandler),
            Arc::new(HttpProtocolHandler::new(timeout, user_agent)?),
        ];
        for handler in protocols {
            for scheme in handler.schemes() {
                handlers.insert(scheme.to_string(), handler.clone());
            }
        }
        Ok(Self { handlers: RwLock::new(handlers), ..Self::empty() })
    }

    /// Register (or replace) the handler for each of its schemes.
    pub async fn register_handler(&self, handler: Arc<dyn ProtocolHandler>) {
        let mut handlers = self.handlers.write().await;
        for scheme in handler.schemes() {
            log::debug!("Registering protocol handler for '{}'", scheme);
            handlers.insert(scheme.to_string(), handler.clone());
        }
    }

    /// Register a request for `url` and start its worker.
    ///
    /// The listener, if any, is called once with the request in its terminal state.
    pub async fn open_connection(
        &self,
        url: Url,
        destination: PathBuf,
        listener: Option<Arc<dyn ConnectionListener>>,
    ) -> std::result::Result<Arc<ConnectionRequest>, ConnectionError> {
        let handler = self.handlers.read().await
            .get(url.scheme())
            .cloned()
            .ok_or_else(|| ConnectionError::UnsupportedProtocol { scheme: url.scheme().to_string() })?;

        let request = {
            // Checked under the same lock shutdown takes, so no request slips past it
            let mut live = self.live.lock().await;
            if live.closed {
                return Err(ConnectionError::Shutdown { url: url.to_string() });
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let request = Arc::new(ConnectionRequest::new(id, url, destination, handler.is_cancelable()));
            live.requests.insert(id, request.clone());
            request
        };

        log::debug!("Opening request {} for {}", request.id(), request.url());
        tokio::spawn(run_request(request.clone(), handler, listener, self.live.clone()));
        Ok(request)
    }

    /// Close the manager to new requests and force-close every live one.
    pub async fn shutdown(&self) {
        let mut live = self.live.lock().await;
        live.closed = true;
        let mut closed = 0;
        for request in live.requests.values() {
            if request.force_close() {
                closed += 1;
            }
        }
        log::info!("Connection manager shut down, {} live request(s) force-closed", closed);
    }

    pub async fn is_shut_down(&self) -> bool {
        self.live.lock().await.closed
    }

    /// Number of requests whose worker has not finished yet
    pub async fn live_count(&self) -> usize {
        self.live.lock().await.requests.len()
    }
}

async fn run_request(
    request: Arc<ConnectionRequest>,
    handler: Arc<dyn ProtocolHandler>,
    listener: Option<Arc<dyn ConnectionListener>>,
    live: Arc<Mutex<LiveRequests>>,
) {
    if request.begin() {
        tokio::select! {
            outcome = handler.fetch(request.url(), request.destination(), request.progress()) => {
                // Loses to a cancel that already moved the request out of WAITING
                request.complete(outcome);
            }
            _ = request.interrupted() => {}
        }
    }

    let status = request.status();
    match status {
        ConnectionStatus::Error => log::warn!("Request {} for {} failed", request.id(), request.url()),
        _ => log::debug!("Request {} for {} finished: {}", request.id(), request.url(), status),
    }

    if let Some(listener) = listener {
        listener.connection_closed(&request);
    }
    live.lock().await.requests.remove(&request.id());
    request.settle();
}

#[async_trait]
impl KernelComponent for ConnectionManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn start(&self) -> Result<()> {
        let schemes: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        log::info!("Connection manager serving {:?}", schemes);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown().await;
        Ok(())
    }
}
