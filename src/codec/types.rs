use super::compression::CompressionType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire form of a state bundle: the three values carried by the publish RPC.
///
/// Exists only for the duration of one send, but may be shared between the
/// sends of one version since encoding does not depend on the target node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBundle {
    pub compression: CompressionType,
    /// Byte length of the payload before compression.
    pub uncompressed_size: i32,
    pub payload: Vec<u8>,
}

/// Self-contained framing used when a bundle travels as one opaque blob.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct EnvelopeFrame {
    pub compression: u8,
    pub uncompressed_size: i32,
    pub payload: Vec<u8>,
}

// --- Structured payload ---
//
// Field names are part of the wire format shared with content nodes.

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WireBundle {
    pub states: WireStates,

    #[serde(
        rename = "deferred-activation",
        default,
        skip_serializing_if = "is_false"
    )]
    pub deferred_activation: bool,

    #[serde(rename = "feed-block", default, skip_serializing_if = "Option::is_none")]
    pub feed_block: Option<WireFeedBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WireStates {
    pub baseline: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spaces: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct WireFeedBlock {
    #[serde(rename = "block-feed-in-cluster")]
    pub blocked: bool,

    #[serde(default)]
    pub description: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}
