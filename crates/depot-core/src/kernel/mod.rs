//! # Depot Core Kernel
//!
//! Wiring and shared vocabulary of the engine.
//!
//! - **Bootstrap**: [`Application`](bootstrap::Application) builds the
//!   connection manager, content cache, handler registry, trust store and
//!   event dispatcher from a [`DepotConfig`](crate::storage::DepotConfig) and
//!   opens local sites on top of them.
//! - **Component Lifecycle**: long-lived services implement
//!   [`KernelComponent`](component::KernelComponent) and are started and
//!   stopped by the application.
//! - **Core Constants**: names, on-disk layout and defaults in `constants`.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) aggregating
//!   each subsystem's error, and the matching `Result` alias.
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use component::KernelComponent;
pub use error::{Error, KernelLifecyclePhase, Result};
