//! Content Node Module
//!
//! The receiving end of cluster state distribution.
//!
//! ## Responsibilities
//! - **Publish**: Decode bundles, reject malformed ones, hold deferred bundles as pending.
//! - **Activate**: Promote the pending bundle when its exact version is activated;
//!   ignore and log stale activations, replying with the version actually active.
//! - **HTTP**: `axum` handlers exposing both verbs.

pub mod handlers;
pub mod receiver;

pub use receiver::{Activation, ActivationReply, ClusterStateReceiver};
