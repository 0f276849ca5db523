//! Error Taxonomy
//!
//! Typed failures shared by the codec, the communicator and the node-side
//! receiver. Every outcome that crosses an asynchronous boundary is one of
//! these values; nothing in the library panics on malformed input.

use std::time::Duration;
use thiserror::Error;

/// Failures while parsing or building a textual cluster state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid cluster state token '{token}': {reason}")]
    InvalidToken { token: String, reason: String },

    #[error("node index {index} out of range for {node_type} count {count}")]
    NodeIndexOutOfRange {
        node_type: &'static str,
        index: u16,
        count: u16,
    },

    #[error("state '{0}' is not valid at cluster level")]
    InvalidClusterState(char),

    #[error("distribution bits {0} outside 1..=64")]
    InvalidDistributionBits(u8),
}

/// Failures raised by the bundle codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bundle could not be serialized. Not expected for well-formed bundles.
    #[error("failed to encode state bundle: {0}")]
    Encoding(String),

    /// Input ended before a complete message could be read.
    #[error("truncated state bundle: {0}")]
    Truncated(String),

    #[error("unknown compression type id {0}")]
    UnknownCompression(u8),

    /// Bytes were read completely but do not describe a valid bundle.
    #[error("malformed state bundle: {0}")]
    Malformed(String),
}

impl CodecError {
    /// True for every variant produced while decoding received bytes.
    pub fn is_decoding(&self) -> bool {
        !matches!(self, CodecError::Encoding(_))
    }
}

impl From<StateError> for CodecError {
    fn from(err: StateError) -> Self {
        CodecError::Malformed(err.to_string())
    }
}

/// Outcome failures of a single RPC to a content node.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Connection refused, invalid or stale target, or mid-flight I/O failure.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The node answered but refused the request.
    #[error("request rejected by node: {0}")]
    Rejected(String),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    /// The node's active version after activation is not the requested one.
    #[error("stale activation: requested version {requested}, node reports {actual}")]
    StaleActivation { requested: u32, actual: u32 },
}

impl RpcError {
    /// Transport-level failures invalidate the cached session for a node.
    pub fn invalidates_session(&self) -> bool {
        matches!(self, RpcError::Transport(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("start percent {start} must not exceed stop percent {stop}")]
    InvertedWindow { start: u8, stop: u8 },

    #[error("timeout percent {0} is above 100")]
    PercentOutOfRange(u8),

    #[error("max timeout must be positive")]
    ZeroTimeout,

    #[error("max timeout {0}ms exceeds the supported maximum")]
    TimeoutTooLarge(u128),
}
