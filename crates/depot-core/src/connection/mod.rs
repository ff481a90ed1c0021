//! # Depot Core Connections
//!
//! Cancellable, asynchronous fetches of remote content.
//!
//! The [`ConnectionManager`] is an explicitly constructed service holding every
//! live [`ConnectionRequest`]. Each request runs on its own worker task, walks
//! `IDLE -> WAITING -> OK | ERROR | CANCELED`, notifies its listener once and
//! removes itself from the registry. Transfers are delegated to a
//! [`ProtocolHandler`] chosen by URL scheme.
pub mod error;
pub mod manager;
pub mod protocol;
pub mod request;

pub use error::ConnectionError;
pub use manager::{ConnectionListener, ConnectionManager};
pub use protocol::{FileProtocolHandler, HttpProtocolHandler, ProtocolHandler};
pub use request::{ConnectionRequest, ConnectionStatus, RequestId};
