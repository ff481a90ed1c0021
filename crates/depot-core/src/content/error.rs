//! # Depot Core Content Errors
//!
//! Errors raised while addressing, fetching and staging feature content.
//! These stay close to plain I/O failures; the install orchestrator decides
//! how they unwind a transaction.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Content reference '{identifier}' has no local file representation")]
    NotAFile { identifier: String },

    #[error("Content reference '{identifier}' cannot be expressed as a URL: {reason}")]
    NotAUrl { identifier: String, reason: String },

    #[error("Remote content '{identifier}' must be resolved through the content cache before it is opened")]
    NotResolved { identifier: String },

    #[error("Entry '{entry}' not found in archive '{}'", .archive.display())]
    MissingEntry { archive: PathBuf, entry: String },

    #[error("Archive error in '{}': {source}", .archive.display())]
    Archive {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error during '{operation}' on '{target}': {source}")]
    Io {
        operation: String,
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid content location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Download of '{url}' failed: {source}")]
    Download {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download of '{url}' was canceled")]
    Canceled { url: String },

    #[error("Entry path '{path}' escapes the staging area")]
    UnsafeEntryPath { path: String },

    #[error("Cannot commit feature '{feature}': {open} entry consumer(s) still open")]
    OpenSubConsumers { feature: String, open: usize },

    #[error("Consumer for feature '{feature}' is already closed")]
    ConsumerClosed { feature: String },

    #[error("Feature '{feature}' already has '{}' installed", .path.display())]
    AlreadyInstalled { feature: String, path: PathBuf },
}

impl ContentError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, target: impl Into<String>) -> Self {
        ContentError::Io {
            operation: operation.into(),
            target: target.into(),
            source,
        }
    }
}
