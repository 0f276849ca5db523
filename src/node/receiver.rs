//! Node-side handling of published and activated cluster states.
//!
//! A deferred bundle is held as *pending* until an activation for exactly its
//! version arrives. Activations for versions the node never received, or for
//! versions older than the active one, can legitimately show up after network
//! reordering; they are logged and ignored, and the reply carries the version
//! the node actually has active so the coordinator can tell. The active
//! version never moves backwards: a late publish of an older version is
//! dropped as well.

use crate::codec::BundleCodec;
use crate::communicator::protocol::{
    ACTIVATE_CLUSTER_STATE_VERSION_METHOD, RpcRequest, RpcResponse,
    SET_DISTRIBUTION_STATES_METHOD,
};
use crate::error::{CodecError, RpcError};
use crate::state::StateBundle;

use parking_lot::Mutex;
use std::sync::Arc;

/// What an activation request did to the node's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The pending bundle with the requested version became active.
    Activated,
    /// The requested version was already active.
    AlreadyActive,
    /// No pending bundle with this version; nothing changed.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationReply {
    pub activation: Activation,
    /// Version active on the node after the request, 0 if none.
    pub actual_version: u32,
}

#[derive(Default)]
struct ReceiverState {
    active: Option<Arc<StateBundle>>,
    pending: Option<Arc<StateBundle>>,
}

impl ReceiverState {
    fn active_version(&self) -> u32 {
        self.active.as_ref().map(|bundle| bundle.version()).unwrap_or(0)
    }
}

pub struct ClusterStateReceiver {
    codec: BundleCodec,
    state: Mutex<ReceiverState>,
}

impl Default for ClusterStateReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterStateReceiver {
    pub fn new() -> Self {
        Self {
            codec: BundleCodec::default(),
            state: Mutex::new(ReceiverState::default()),
        }
    }

    pub fn active(&self) -> Option<Arc<StateBundle>> {
        self.state.lock().active.clone()
    }

    pub fn pending(&self) -> Option<Arc<StateBundle>> {
        self.state.lock().pending.clone()
    }

    pub fn active_version(&self) -> u32 {
        self.state.lock().active_version()
    }

    /// Decodes and stores a published bundle. Undecodable input is rejected
    /// without touching the current state.
    pub fn set_distribution_states(
        &self,
        compression: u8,
        uncompressed_size: i32,
        payload: &[u8],
    ) -> Result<u32, CodecError> {
        let bundle = match self.codec.decode_parts(compression, uncompressed_size, payload) {
            Ok(bundle) => Arc::new(bundle),
            Err(e) => {
                tracing::warn!("Rejected published cluster state: {}", e);
                return Err(e);
            }
        };
        Ok(self.store(bundle))
    }

    /// Stores an already decoded bundle; returns its version. A bundle older
    /// than the active one is logged and dropped.
    pub fn store(&self, bundle: Arc<StateBundle>) -> u32 {
        let version = bundle.version();
        let mut state = self.state.lock();

        if state.active.is_some() && version < state.active_version() {
            tracing::warn!(
                "Ignoring cluster state version {}: version {} already active",
                version,
                state.active_version()
            );
        } else if bundle.deferred_activation() {
            tracing::debug!("Holding cluster state version {} pending activation", version);
            state.pending = Some(bundle);
        } else {
            tracing::info!("Activating cluster state version {}: {}", version, bundle);
            state.pending = None;
            state.active = Some(bundle);
        }
        version
    }

    pub fn activate_version(&self, version: u32) -> ActivationReply {
        let mut state = self.state.lock();
        let actual_version = state.active_version();

        let superseded = state.active.is_some() && version < actual_version;
        let pending_matches = state
            .pending
            .as_ref()
            .is_some_and(|bundle| bundle.version() == version);
        if pending_matches && !superseded {
            let bundle = state.pending.take();
            state.active = bundle;
            tracing::info!("Activated pending cluster state version {}", version);
            return ActivationReply {
                activation: Activation::Activated,
                actual_version: version,
            };
        }

        if state.active.is_some() && actual_version == version {
            tracing::debug!("Cluster state version {} already active", version);
            return ActivationReply {
                activation: Activation::AlreadyActive,
                actual_version,
            };
        }

        tracing::warn!(
            "Ignoring activation of cluster state version {}: pending {:?}, active {}",
            version,
            state.pending.as_ref().map(|b| b.version()),
            actual_version
        );
        ActivationReply {
            activation: Activation::Stale,
            actual_version,
        }
    }

    /// Entry point for transports: dispatches a raw RPC by method name.
    pub fn handle_rpc(&self, request: &RpcRequest) -> Result<RpcResponse, RpcError> {
        match request.method.as_str() {
            SET_DISTRIBUTION_STATES_METHOD => {
                let (compression, size, payload) = request.publish_params()?;
                self.set_distribution_states(compression, size, payload)?;
                Ok(RpcResponse::empty())
            }
            ACTIVATE_CLUSTER_STATE_VERSION_METHOD => {
                let requested = request.activate_params()?;
                let requested = u32::try_from(requested).map_err(|_| {
                    RpcError::Rejected(format!("negative cluster state version {}", requested))
                })?;
                let reply = self.activate_version(requested);
                let actual = i32::try_from(reply.actual_version).unwrap_or(i32::MAX);
                Ok(RpcResponse::int32(actual))
            }
            other => Err(RpcError::UnknownMethod(other.to_string())),
        }
    }
}
