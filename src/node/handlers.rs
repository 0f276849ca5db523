use axum::{
    Router,
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    routing::post,
};
use std::sync::Arc;

use super::receiver::ClusterStateReceiver;
use crate::communicator::{RpcRequest, RpcValue};
use crate::error::RpcError;
use crate::http::protocol::ENDPOINT_RPC;

pub fn router(receiver: Arc<ClusterStateReceiver>) -> Router {
    Router::new()
        .route(ENDPOINT_RPC, post(handle_rpc))
        .layer(Extension(receiver))
}

pub async fn handle_rpc(
    Extension(receiver): Extension<Arc<ClusterStateReceiver>>,
    Path(method): Path<String>,
    body: Bytes,
) -> (StatusCode, Vec<u8>) {
    let params: Vec<RpcValue> = match bincode::deserialize(&body) {
        Ok(params) => params,
        Err(e) => {
            tracing::warn!("Failed to decode parameters of '{}': {}", method, e);
            return (
                StatusCode::BAD_REQUEST,
                format!("malformed parameters: {}", e).into_bytes(),
            );
        }
    };

    let request = RpcRequest { method, params };
    match receiver.handle_rpc(&request) {
        Ok(response) => match bincode::serialize(&response.returns) {
            Ok(bytes) => (StatusCode::OK, bytes),
            Err(e) => {
                tracing::error!("Failed to encode reply to '{}': {}", request.method, e);
                (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
            }
        },
        Err(e) => {
            let status = match &e {
                RpcError::UnknownMethod(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, e.to_string().into_bytes())
        }
    }
}
