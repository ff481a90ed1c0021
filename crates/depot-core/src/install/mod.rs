//! # Depot Core Install
//!
//! Install transactions and the handler lifecycle around them.
//!
//! [`FeatureInstaller`] moves one feature from a [`FeatureContentProvider`]
//! into an [`InstallTarget`]: it fetches and verifies the feature archive and
//! every plugin the target lacks, lets the feature's [`InstallHandler`] take
//! part, stores everything through the target's consumer and commits. Any
//! failure aborts the consumer, so the target is left as it was.
//!
//! [`FeatureContentProvider`]: crate::content::FeatureContentProvider
pub mod error;
pub mod handler;
pub mod orchestrator;
pub mod state;

pub use error::InstallError;
pub use handler::{
    DataPlacementHandler, DefaultInstallHandler, HandlerContext, HandlerRegistry, InstallHandler, NonPluginDownload,
};
pub use orchestrator::{install_work, FeatureInstaller, InstallTarget};
pub use state::{InstallState, InstallTransaction};
