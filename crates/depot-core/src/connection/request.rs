use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, Notify};
use url::Url;

/// Identifier of a live connection request
pub type RequestId = u64;

/// Lifecycle of a connection request.
///
/// `Idle -> Waiting -> Ok | Error`, with `Canceled` reachable from `Waiting`
/// (cancelable protocols) or from `Idle`/`Waiting` on shutdown. Terminal states
/// are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Waiting,
    Ok,
    Canceled,
    Error,
}

impl ConnectionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Ok | ConnectionStatus::Canceled | ConnectionStatus::Error)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Idle => "IDLE",
            ConnectionStatus::Waiting => "WAITING",
            ConnectionStatus::Ok => "OK",
            ConnectionStatus::Canceled => "CANCELED",
            ConnectionStatus::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// One fetch of `url` into `destination`, owned by the connection manager.
///
/// Every status change goes through the status channel's `send_if_modified`,
/// which is the request's single synchronization point: whichever of
/// completion, cancellation or shutdown gets there first decides the terminal
/// state, and the others become no-ops.
pub struct ConnectionRequest {
    id: RequestId,
    url: Url,
    destination: PathBuf,
    cancelable: bool,
    status: watch::Sender<ConnectionStatus>,
    settled: watch::Sender<bool>,
    error: Mutex<Option<io::Error>>,
    interrupt: Notify,
    bytes_read: AtomicU64,
}

impl ConnectionRequest {
    pub(crate) fn new(id: RequestId, url: Url, destination: PathBuf, cancelable: bool) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Idle);
        let (settled, _) = watch::channel(false);
        Self {
            id,
            url,
            destination,
            cancelable,
            status,
            settled,
            error: Mutex::new(None),
            interrupt: Notify::new(),
            bytes_read: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Bytes written to the destination so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::SeqCst)
    }

    pub(crate) fn progress(&self) -> &AtomicU64 {
        &self.bytes_read
    }

    /// Cancel a waiting request of a cancelable protocol. Returns whether it took effect.
    pub fn cancel(&self) -> bool {
        if !self.cancelable {
            return false;
        }
        let canceled = self.status.send_if_modified(|status| {
            if *status == ConnectionStatus::Waiting {
                *status = ConnectionStatus::Canceled;
                true
            } else {
                false
            }
        });
        if canceled {
            log::debug!("Request {} for {} canceled", self.id, self.url);
            self.interrupt.notify_one();
        }
        canceled
    }

    /// Cancel regardless of protocol; used by manager shutdown.
    pub(crate) fn force_close(&self) -> bool {
        let closed = self.status.send_if_modified(|status| {
            if matches!(*status, ConnectionStatus::Idle | ConnectionStatus::Waiting) {
                *status = ConnectionStatus::Canceled;
                true
            } else {
                false
            }
        });
        if closed {
            self.interrupt.notify_one();
        }
        closed
    }

    /// IDLE -> WAITING. Fails if the request was closed before its worker started.
    pub(crate) fn begin(&self) -> bool {
        self.status.send_if_modified(|status| {
            if *status == ConnectionStatus::Idle {
                *status = ConnectionStatus::Waiting;
                true
            } else {
                false
            }
        })
    }

    /// WAITING -> OK or ERROR. The error is captured inside the same transition.
    pub(crate) fn complete(&self, outcome: io::Result<u64>) -> bool {
        self.status.send_if_modified(|status| {
            if *status != ConnectionStatus::Waiting {
                return false;
            }
            match outcome {
                Ok(_) => *status = ConnectionStatus::Ok,
                Err(e) => {
                    if let Ok(mut slot) = self.error.lock() {
                        *slot = Some(e);
                    }
                    *status = ConnectionStatus::Error;
                }
            }
            true
        })
    }

    pub(crate) async fn interrupted(&self) {
        self.interrupt.notified().await
    }

    /// Mark the request as fully processed: listener notified and deregistered.
    pub(crate) fn settle(&self) {
        self.settled.send_replace(true);
    }

    /// Wait until the worker has finished with this request and return its terminal status.
    pub async fn wait(&self) -> ConnectionStatus {
        let mut settled = self.settled.subscribe();
        // The sender lives as long as `self`, so this only returns once settled
        let _ = settled.wait_for(|done| *done).await;
        self.status()
    }

    /// Take the error captured by an ERROR transition.
    pub fn take_error(&self) -> Option<io::Error> {
        self.error.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRequest")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("status", &self.status())
            .field("cancelable", &self.cancelable)
            .finish()
    }
}
