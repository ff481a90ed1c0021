use std::fmt::Debug;
use async_trait::async_trait;
use crate::kernel::error::Result;

/// Lifecycle trait for the long-lived services the application wires together
/// (connection manager, local sites).
#[async_trait]
pub trait KernelComponent: Send + Sync + Debug {
    fn name(&self) -> &'static str;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}
