//! `reqwest`-based implementation of the RPC transport seam.

use super::protocol::rpc_url;
use crate::communicator::{NodeTarget, RpcRequest, RpcResponse, RpcSession, RpcTransport, RpcValue};
use crate::error::{CodecError, RpcError};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Transport that reaches nodes over HTTP. Connection pooling is left to
/// the shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn connect(&self, target: &NodeTarget) -> Result<Arc<dyn RpcSession>, RpcError> {
        let url = rpc_url(&target.address, "");
        if target.address.is_empty() || reqwest::Url::parse(&url).is_err() {
            return Err(RpcError::Transport(format!(
                "invalid target address '{}' for {}",
                target.address, target.key
            )));
        }

        Ok(Arc::new(HttpSession {
            http_client: self.http_client.clone(),
            address: target.address.clone(),
        }))
    }
}

struct HttpSession {
    http_client: reqwest::Client,
    address: String,
}

#[async_trait]
impl RpcSession for HttpSession {
    async fn invoke(&self, request: RpcRequest, timeout: Duration) -> Result<RpcResponse, RpcError> {
        let body = bincode::serialize(&request.params)
            .map_err(|e| RpcError::Codec(CodecError::Encoding(e.to_string())))?;

        let response = self
            .http_client
            .post(rpc_url(&self.address, &request.method))
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RpcError::UnknownMethod(request.method));
        }
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(RpcError::Rejected(format!("{}: {}", status, reason)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        let returns: Vec<RpcValue> = bincode::deserialize(&bytes)
            .map_err(|e| RpcError::Transport(format!("malformed reply from {}: {}", self.address, e)))?;

        Ok(RpcResponse { returns })
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> RpcError {
    if error.is_timeout() {
        RpcError::Timeout(timeout)
    } else {
        RpcError::Transport(error.to_string())
    }
}
