//! # Depot Core Events
//!
//! Asynchronous notification of site changes.
//!
//! Listeners register with a [`SharedEventDispatcher`] either by event name
//! (`"site.feature_installed"`) or by concrete event type ([`SiteEvent`]).
//! Events are dispatched inline, in registration order.
pub mod dispatcher;
pub mod types;

use std::any::Any;
use std::fmt;

use async_trait::async_trait;

/// Identifier handed out for each registered handler
pub type EventId = u64;

/// Whether dispatch continues to the next handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    Stop,
}

/// Core event trait
pub trait Event: Any + fmt::Debug + Send + Sync {
    /// Name handlers can register for
    fn name(&self) -> &'static str;

    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
pub trait AsyncEventHandler: Send + Sync {
    async fn handle(&self, event: &dyn Event) -> EventResult;
}

pub use dispatcher::{sync_event_handler, sync_typed_handler, EventDispatcher, SharedEventDispatcher};
pub use types::SiteEvent;

#[cfg(test)]
mod tests;
