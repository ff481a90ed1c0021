//! # Depot Core Connection Errors
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connection manager is shut down; '{url}' was not opened")]
    Shutdown { url: String },

    #[error("No protocol handler registered for scheme '{scheme}'")]
    UnsupportedProtocol { scheme: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
