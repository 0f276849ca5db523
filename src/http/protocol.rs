//! HTTP Carriage Protocol
//!
//! Both cluster-wide verbs travel as `POST /rpc/<method>`. Bodies are the
//! `bincode`-encoded parameter list; replies are the `bincode`-encoded return
//! list. A refused call answers with a non-2xx status and a text reason.

/// Route served by nodes, with the RPC method name as the last segment.
pub const ENDPOINT_RPC: &str = "/rpc/:method";

pub fn rpc_url(address: &str, method: &str) -> String {
    format!("http://{}/rpc/{}", address, method)
}
