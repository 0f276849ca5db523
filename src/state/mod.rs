//! Cluster State Model
//!
//! Value types describing one versioned snapshot of cluster health as
//! distributed by the coordinator.
//!
//! ## Core Concepts
//! - **`ClusterState`**: Baseline description of which distributor and storage nodes are up.
//!   Has a compact textual form (`version:7 distributor:3 .1.s:d storage:3`).
//! - **`StateBundle`**: The unit that is published. A baseline, optional per-space
//!   overrides, the deferred-activation flag and an optional feed block.
//! - **`FeedBlock`**: Cluster-wide write throttling signal with a reason.

pub mod text;
pub mod types;

pub use types::{
    ClusterState, FeedBlock, NodeStates, NodeType, State, StateBundle, StateBundleBuilder,
    DEFAULT_DISTRIBUTION_BITS, MAX_DISTRIBUTION_BITS,
};
