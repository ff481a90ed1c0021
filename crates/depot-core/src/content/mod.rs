//! # Depot Core Content
//!
//! Addressing, fetching and staging of feature content.
//!
//! - [`ContentReference`]: a byte source backed by a local file, a remote URL
//!   or an entry inside a jar.
//! - [`ContentCache`]: local copies of remote references, downloaded at most
//!   once per key through the connection manager.
//! - [`FeatureContentProvider`]: where a feature's archives come from.
//! - [`FeatureContentConsumer`]: where they go, committed or aborted as a whole.
pub mod cache;
pub mod consumer;
pub mod error;
pub mod provider;
pub mod reference;

pub use cache::ContentCache;
pub use consumer::{ContentConsumer, FeatureContentConsumer, SiteFileConsumer};
pub use error::ContentError;
pub use provider::{ArchiveFeatureProvider, FeatureContentProvider};
pub use reference::{Backing, ContentReference};

#[cfg(test)]
mod tests;
