//! # Depot Core Site Errors
//!
//! Contract violations on the site model and its configuration history.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Feature '{feature}' already belongs to site '{site}'")]
    SiteAlreadyAssigned { feature: String, site: String },

    #[error("Feature '{0}' is not installed on this site")]
    UnknownFeature(String),

    #[error("Feature '{0}' is already configured")]
    AlreadyConfigured(String),

    #[error("Feature '{0}' is not configured")]
    NotConfigured(String),

    #[error("No configuration with id {0}")]
    UnknownConfiguration(u64),

    #[error("The configuration history has no current configuration")]
    NoCurrentConfiguration,

    #[error("Invalid site location '{}': {reason}", .path.display())]
    InvalidLocation { path: PathBuf, reason: String },
}
