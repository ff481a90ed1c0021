//! # Depot Core Site
//!
//! Installed features and the history of how they were configured.
//!
//! - [`Site`]: the features installed in one directory; the install target of
//!   the orchestrator.
//! - [`LocalSite`]: the service around a site: install, remove, configure,
//!   unconfigure and revert, each recorded as a new [`InstallConfiguration`]
//!   in an immutable [`ConfigurationHistory`] and announced as a
//!   [`SiteEvent`](crate::event::SiteEvent).
//! - [`bookkeeping`]: which plugins a feature adds and which it alone uses.
pub mod bookkeeping;
pub mod configuration;
pub mod error;
pub mod history;
pub mod local;
#[allow(clippy::module_inception)]
pub mod site;

pub use bookkeeping::{plugin_delta, plugins_only_referenced_by, unsatisfied_imports};
pub use configuration::{Activity, ActivityAction, ActivityStatus, ConfiguredSite, InstallConfiguration};
pub use error::SiteError;
pub use history::ConfigurationHistory;
pub use local::{LocalSite, SiteServices};
pub use site::Site;

#[cfg(test)]
mod tests;
