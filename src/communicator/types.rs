use crate::error::RpcError;
use crate::state::NodeType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;

/// Identity of a content node within the cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub node_type: NodeType,
    pub distribution_key: u16,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node_type.as_str(), self.distribution_key)
    }
}

/// A node to send to. The connection behind `address` is owned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTarget {
    pub key: NodeKey,
    pub address: String,
    /// Measured round-trip latency to this node, if known.
    pub latency_hint: Option<Duration>,
}

impl NodeTarget {
    pub fn new(node_type: NodeType, distribution_key: u16, address: impl Into<String>) -> Self {
        Self {
            key: NodeKey {
                node_type,
                distribution_key,
            },
            address: address.into(),
            latency_hint: None,
        }
    }

    pub fn with_latency_hint(mut self, latency: Duration) -> Self {
        self.latency_hint = Some(latency);
        self
    }
}

/// Outcome of one call, delivered exactly once.
#[derive(Debug)]
pub struct NodeReply<T> {
    pub node: NodeKey,
    /// Version that was published or whose activation was requested.
    pub version: u32,
    /// Time from dispatch until the transport completed the call.
    pub round_trip: Duration,
    pub result: Result<T, RpcError>,
}

impl<T> NodeReply<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Receiving half of a pending call. Resolves once the call completes.
pub type Completion<T> = oneshot::Receiver<NodeReply<T>>;
