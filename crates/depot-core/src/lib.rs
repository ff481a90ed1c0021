//! # depot-core
//!
//! Feature installation and configuration engine.
//!
//! A feature is fetched from a [`FeatureContentProvider`], verified, and
//! committed into a [`LocalSite`] by the install orchestrator, or rolled back
//! completely. Every change to a site is recorded as a new configuration in a
//! revertible history.
pub mod connection;
pub mod content;
pub mod event;
pub mod install;
pub mod kernel;
pub mod model;
pub mod monitor;
pub mod site;
pub mod storage;
pub mod verification;

pub use content::{ArchiveFeatureProvider, FeatureContentProvider};
pub use event::{Event, EventDispatcher, SharedEventDispatcher, SiteEvent};
pub use install::{FeatureInstaller, HandlerRegistry, InstallHandler};
pub use kernel::{Application, Error, Result};
pub use model::{Feature, FeatureReference, PluginEntry, VersionedIdentifier};
pub use monitor::ProgressMonitor;
pub use site::{ConfigurationHistory, InstallConfiguration, LocalSite};
pub use storage::{DepotConfig, StorageProvider};

#[cfg(test)]
mod tests;
