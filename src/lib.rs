//! Cluster State Distribution Library
//!
//! Carries versioned cluster state from a coordinator to every content node.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`state`**: Cluster states, per-space derived states, feed-block status and
//!   the `StateBundle` that groups them under one version.
//! - **`codec`**: Compact, self-describing wire encoding of bundles with
//!   adaptive compression, plus a single-blob envelope form.
//! - **`timeout`**: Jittered per-request timeouts padded with a latency budget.
//! - **`communicator`**: Coordinator-side dispatch of the publish and activate
//!   verbs with asynchronous, per-node completions.
//! - **`node`**: Receiving side; holds the active and pending bundles.
//! - **`http`**: HTTP carriage of both verbs between coordinator and nodes.
//! - **`error`**: Typed errors shared by the modules above.

pub mod codec;
pub mod communicator;
pub mod error;
pub mod http;
pub mod node;
pub mod state;
pub mod timeout;
