//! Node Communicator Module
//!
//! Coordinator-side dispatch of the two cluster-wide verbs to content nodes.
//!
//! ## Protocol
//! 1. **Publish** (`setdistributionstates`): ships an encoded state bundle as
//!    compression id, uncompressed size and payload.
//! 2. **Activate** (`activate_cluster_state_version`): carries only a version and
//!    flips a node from its stored pending bundle to that version.
//!
//! Splitting the two lets the driver confirm that every node holds a version
//! before any node starts acting on it.
//!
//! ## Submodules
//! - **`service`**: `NodeCommunicator`, per-call tasks and completion delivery.
//! - **`protocol`**: Method names, parameter signatures and typed RPC values.
//! - **`transport`**: Traits implemented by the underlying RPC layer.
//! - **`options`**: Hot-reloadable tunables.

pub mod options;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod types;

pub use options::CommunicatorOptions;
pub use protocol::{RpcRequest, RpcResponse, RpcValue};
pub use service::NodeCommunicator;
pub use transport::{RpcSession, RpcTransport};
pub use types::{Completion, NodeKey, NodeReply, NodeTarget};

#[cfg(test)]
mod tests;
