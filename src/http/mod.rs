//! HTTP Transport Module
//!
//! Carries the publish and activate verbs between coordinator and nodes.
//!
//! - **`client`**: `HttpTransport`, the coordinator side, built on `reqwest`.
//! - **`protocol`**: Route and body conventions shared with the node handlers
//!   in `node::handlers`.

pub mod client;
pub mod protocol;

pub use client::HttpTransport;
