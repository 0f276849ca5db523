//! Node Communicator
//!
//! Dispatches the publish and activate verbs to single nodes. Each call runs
//! on its own task and reports through a one-shot completion, so a slow or
//! dead node never holds up calls to other nodes. There is no retry here:
//! only the driver knows whether a newer version has superseded the one in flight.

use super::options::CommunicatorOptions;
use super::protocol::{RpcRequest, RpcResponse};
use super::transport::{RpcSession, RpcTransport};
use super::types::*;
use crate::codec::{BundleCodec, EncodedBundle};
use crate::error::{CodecError, ConfigError, RpcError};
use crate::state::StateBundle;
use crate::timeout::{Clock, RequestTimeoutGenerator, SystemClock};

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// A session together with the address it was opened for.
struct CachedSession {
    address: String,
    session: Arc<dyn RpcSession>,
}

pub struct NodeCommunicator {
    transport: Arc<dyn RpcTransport>,
    /// Sessions per node, dropped after a transport failure or address change.
    sessions: DashMap<NodeKey, CachedSession>,
    timeouts: RequestTimeoutGenerator,
    /// Single source of truth for every call. Each call reads it once, so
    /// its timeout window and codec settings always come from the same options.
    options: RwLock<Arc<CommunicatorOptions>>,
    clock: Arc<dyn Clock>,
}

impl NodeCommunicator {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        options: CommunicatorOptions,
        round_trip_latency_budget: Duration,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::with_clock(
            transport,
            options,
            round_trip_latency_budget,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        transport: Arc<dyn RpcTransport>,
        options: CommunicatorOptions,
        round_trip_latency_budget: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>, ConfigError> {
        options.validate()?;
        let timeouts = RequestTimeoutGenerator::new(options.timeout, round_trip_latency_budget)?;

        Ok(Arc::new(Self {
            transport,
            sessions: DashMap::new(),
            timeouts,
            options: RwLock::new(Arc::new(options)),
            clock,
        }))
    }

    pub fn options(&self) -> Arc<CommunicatorOptions> {
        self.options.read().clone()
    }

    pub fn timeouts(&self) -> &RequestTimeoutGenerator {
        &self.timeouts
    }

    /// Codec matching the current options. Drivers fanning one version out to
    /// many nodes encode once with it and use `publish_encoded`.
    pub fn codec(&self) -> BundleCodec {
        BundleCodec::new(self.options().compression)
    }

    /// Encodes `bundle` and sends it to `target`'s set-distribution-states endpoint.
    pub fn publish_state(self: &Arc<Self>, bundle: &StateBundle, target: NodeTarget) -> Completion<()> {
        let options = self.options();
        if bundle.baseline().distribution_bits() != options.distribution_bits {
            tracing::warn!(
                "Bundle version {} announces {} distribution bits, configured {}",
                bundle.version(),
                bundle.baseline().distribution_bits(),
                options.distribution_bits
            );
        }

        match BundleCodec::new(options.compression).encode(bundle) {
            Ok(encoded) => {
                let request = RpcRequest::set_distribution_states(&encoded);
                self.dispatch(&options, target, bundle.version(), request, |_| Ok(()))
            }
            Err(e) => {
                tracing::error!(
                    "Failed to encode bundle version {} for {}: {}",
                    bundle.version(),
                    target.key,
                    e
                );
                completed(NodeReply {
                    node: target.key,
                    version: bundle.version(),
                    round_trip: Duration::ZERO,
                    result: Err(e.into()),
                })
            }
        }
    }

    /// Sends an already encoded bundle of `version` to `target`.
    pub fn publish_encoded(
        self: &Arc<Self>,
        encoded: Arc<EncodedBundle>,
        version: u32,
        target: NodeTarget,
    ) -> Completion<()> {
        let request = RpcRequest::set_distribution_states(&encoded);
        self.dispatch(&self.options(), target, version, request, |_| Ok(()))
    }

    /// Asks `target` to make the previously published `version` its active state.
    pub fn activate_version(self: &Arc<Self>, version: u32, target: NodeTarget) -> Completion<u32> {
        let wire_version = match i32::try_from(version) {
            Ok(v) => v,
            Err(_) => {
                return completed(NodeReply {
                    node: target.key,
                    version,
                    round_trip: Duration::ZERO,
                    result: Err(CodecError::Encoding(format!(
                        "version {} does not fit the wire format",
                        version
                    ))
                    .into()),
                });
            }
        };

        let request = RpcRequest::activate_cluster_state_version(wire_version);
        self.dispatch(&self.options(), target, version, request, move |response| {
            let actual = response.single_int32()?;
            let actual = u32::try_from(actual)
                .map_err(|_| RpcError::Rejected(format!("negative version {} in reply", actual)))?;
            if actual != version {
                return Err(RpcError::StaleActivation {
                    requested: version,
                    actual,
                });
            }
            Ok(actual)
        })
    }

    /// Replaces the tunables used by subsequent calls. Calls already in
    /// flight keep the timeout they were dispatched with.
    pub fn propagate_options(&self, options: CommunicatorOptions) -> Result<(), ConfigError> {
        options.validate()?;
        let mut current = self.options.write();
        self.timeouts.reconfigure(options.timeout)?;
        *current = Arc::new(options);
        Ok(())
    }

    fn dispatch<T, F>(
        self: &Arc<Self>,
        options: &CommunicatorOptions,
        target: NodeTarget,
        version: u32,
        request: RpcRequest,
        on_response: F,
    ) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce(RpcResponse) -> Result<T, RpcError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let timeout = self
            .timeouts
            .generate_within(&options.timeout, target.latency_hint);
        let communicator = self.clone();

        tokio::spawn(async move {
            let call_id = Uuid::new_v4();
            tracing::debug!(
                "[{}] {} version {} to {} at {} (timeout {:?})",
                call_id,
                request.method,
                version,
                target.key,
                target.address,
                timeout
            );

            let started = communicator.clock.now();
            let result = communicator
                .invoke(&target, request, timeout)
                .await
                .and_then(on_response);
            let round_trip = communicator.clock.now().saturating_duration_since(started);

            match &result {
                Ok(_) => tracing::debug!(
                    "[{}] {} acknowledged version {} after {:?}",
                    call_id,
                    target.key,
                    version,
                    round_trip
                ),
                Err(RpcError::StaleActivation { requested, actual }) => tracing::warn!(
                    "[{}] {} reports version {} after activating {}",
                    call_id,
                    target.key,
                    actual,
                    requested
                ),
                Err(e) => tracing::warn!(
                    "[{}] Call to {} for version {} failed: {}",
                    call_id,
                    target.key,
                    version,
                    e
                ),
            }

            let reply = NodeReply {
                node: target.key,
                version,
                round_trip,
                result,
            };
            if tx.send(reply).is_err() {
                tracing::trace!("[{}] Completion for {} dropped by driver", call_id, target.key);
            }
        });

        rx
    }

    async fn invoke(
        &self,
        target: &NodeTarget,
        request: RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, RpcError> {
        // Connecting counts against the same deadline as the call itself.
        let call = self.connect_and_invoke(target, request, timeout);

        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout(timeout)),
        };

        if let Err(e) = &result
            && e.invalidates_session()
        {
            self.sessions.remove(&target.key);
        }

        result
    }

    async fn connect_and_invoke(
        &self,
        target: &NodeTarget,
        request: RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, RpcError> {
        let session = self.session_for(target).await?;
        session.invoke(request, timeout).await
    }

    async fn session_for(&self, target: &NodeTarget) -> Result<Arc<dyn RpcSession>, RpcError> {
        if let Some(cached) = self.sessions.get(&target.key) {
            if cached.address == target.address {
                return Ok(cached.session.clone());
            }
            tracing::debug!(
                "{} moved from {} to {}, reconnecting",
                target.key,
                cached.address,
                target.address
            );
        }

        let session = self.transport.connect(target).await?;
        self.sessions.insert(
            target.key,
            CachedSession {
                address: target.address.clone(),
                session: session.clone(),
            },
        );
        Ok(session)
    }

    pub fn cached_session_count(&self) -> usize {
        self.sessions.len()
    }
}

fn completed<T>(reply: NodeReply<T>) -> Completion<T> {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(reply);
    rx
}
