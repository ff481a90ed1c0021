//! # Depot Core Kernel Errors
//!
//! Defines the top-level error type of the `depot-core` crate.
//!
//! Each subsystem owns a typed error enum ([`ContentError`], [`ConnectionError`],
//! [`InstallError`], [`SiteError`], [`StorageSystemError`]). [`Error`] wraps them
//! all so that service entry points can return a single `Result` type while
//! callers can still match on the subsystem that failed.
use std::path::PathBuf;
use std::result::Result as StdResult;

use crate::connection::error::ConnectionError;
use crate::content::error::ContentError;
use crate::install::error::InstallError;
use crate::site::error::SiteError;
use crate::storage::error::StorageSystemError;
use thiserror::Error as ThisError;

/// Custom error type for the depot engine
#[derive(Debug, ThisError)]
pub enum Error {
    /// Content reference, cache or consumer failure
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Connection manager failure
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Install transaction failure
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// Site model or configuration history failure
    #[error("Site error: {0}")]
    Site(#[from] SiteError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase:?}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        component_name: Option<String>,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Bootstrap")]
    Bootstrap,
    #[error("Start")]
    Start,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

// Prefer `Error::io` where the path is known.
impl From<std::io::Error> for Error {
    fn from(io_err: std::io::Error) -> Self {
        Error::StorageSystem(StorageSystemError::Io {
            source: io_err,
            path: PathBuf::new(),
            operation: "unknown".to_string(),
        })
    }
}

impl Error {
    /// Helper to create an I/O error with operation and path context.
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        })
    }

    /// Whether this error, or the cause of a failed install, is a user cancellation.
    pub fn is_canceled(&self) -> bool {
        match self {
            Error::Install(InstallError::Canceled) => true,
            Error::Install(InstallError::Failed { cause, .. }) => cause.is_canceled(),
            Error::Content(ContentError::Canceled { .. }) => true,
            _ => false,
        }
    }
}
