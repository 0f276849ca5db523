//! Seam to the RPC transport. The communicator never opens sockets itself.

use super::protocol::{RpcRequest, RpcResponse};
use super::types::NodeTarget;
use crate::error::RpcError;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// An established handle to one node.
#[async_trait]
pub trait RpcSession: Send + Sync {
    /// Performs one call. Implementations should give up after `timeout`.
    async fn invoke(&self, request: RpcRequest, timeout: Duration) -> Result<RpcResponse, RpcError>;
}

#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn connect(&self, target: &NodeTarget) -> Result<Arc<dyn RpcSession>, RpcError>;
}
