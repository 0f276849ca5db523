//! State Bundle Codec
//!
//! Converts a `StateBundle` into a structured JSON document, then applies the
//! adaptive compression policy. Decoding never panics: truncated input,
//! unknown compression ids and invalid structure all surface as `CodecError`.

use super::compression::{self, CompressionType};
use super::types::*;
use crate::error::CodecError;
use crate::state::{ClusterState, FeedBlock, StateBundle};

/// Encoder/decoder for state bundles.
///
/// Holds only the preferred compression algorithm; encoding is stateless and
/// a single codec can be shared by every sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleCodec {
    compression: CompressionType,
}

impl Default for BundleCodec {
    fn default() -> Self {
        Self {
            compression: CompressionType::Fast,
        }
    }
}

impl BundleCodec {
    pub fn new(compression: CompressionType) -> Self {
        Self { compression }
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn encode(&self, bundle: &StateBundle) -> Result<EncodedBundle, CodecError> {
        let raw = serialize_structured(bundle)?;
        let uncompressed_size = i32::try_from(raw.len()).map_err(|_| {
            CodecError::Encoding(format!("payload of {} bytes exceeds wire limit", raw.len()))
        })?;

        let (compression, payload) = compression::compress(self.compression, raw);

        tracing::trace!(
            "Encoded bundle version {} ({} -> {} bytes, {:?})",
            bundle.version(),
            uncompressed_size,
            payload.len(),
            compression
        );

        Ok(EncodedBundle {
            compression,
            uncompressed_size,
            payload,
        })
    }

    pub fn decode(&self, encoded: &EncodedBundle) -> Result<StateBundle, CodecError> {
        let raw = compression::decompress(
            encoded.compression,
            encoded.uncompressed_size,
            &encoded.payload,
        )?;
        deserialize_structured(&raw)
    }

    /// Decodes the raw RPC parameters of a publish request.
    pub fn decode_parts(
        &self,
        compression_id: u8,
        uncompressed_size: i32,
        payload: &[u8],
    ) -> Result<StateBundle, CodecError> {
        let compression = CompressionType::from_id(compression_id)?;
        let raw = compression::decompress(compression, uncompressed_size, payload)?;
        deserialize_structured(&raw)
    }

    /// Encodes into one opaque blob with the compression metadata prefixed.
    pub fn encode_with_envelope(&self, bundle: &StateBundle) -> Result<Vec<u8>, CodecError> {
        let encoded = self.encode(bundle)?;
        let frame = EnvelopeFrame {
            compression: encoded.compression.id(),
            uncompressed_size: encoded.uncompressed_size,
            payload: encoded.payload,
        };
        bincode::serialize(&frame).map_err(|e| CodecError::Encoding(e.to_string()))
    }

    pub fn decode_with_envelope(&self, bytes: &[u8]) -> Result<StateBundle, CodecError> {
        let frame: EnvelopeFrame = bincode::deserialize(bytes).map_err(|e| match *e {
            bincode::ErrorKind::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                CodecError::Truncated(format!("envelope: {}", io))
            }
            other => CodecError::Malformed(format!("envelope: {}", other)),
        })?;
        self.decode_parts(frame.compression, frame.uncompressed_size, &frame.payload)
    }
}

fn serialize_structured(bundle: &StateBundle) -> Result<Vec<u8>, CodecError> {
    let wire = WireBundle {
        states: WireStates {
            baseline: bundle.baseline().to_string(),
            spaces: bundle
                .spaced_states()
                .iter()
                .map(|(space, state)| (space.clone(), state.to_string()))
                .collect(),
        },
        deferred_activation: bundle.deferred_activation(),
        feed_block: bundle.feed_block().map(|block| WireFeedBlock {
            blocked: block.blocked,
            description: block.description.clone(),
        }),
    };

    serde_json::to_vec(&wire).map_err(|e| CodecError::Encoding(e.to_string()))
}

fn deserialize_structured(raw: &[u8]) -> Result<StateBundle, CodecError> {
    let wire: WireBundle = serde_json::from_slice(raw).map_err(|e| {
        if e.is_eof() {
            CodecError::Truncated(e.to_string())
        } else {
            CodecError::Malformed(e.to_string())
        }
    })?;

    let baseline: ClusterState = wire.states.baseline.parse()?;
    let mut builder = StateBundle::builder(baseline);
    for (space, text) in wire.states.spaces {
        let state: ClusterState = text.parse()?;
        builder = builder.spaced_state(space, state);
    }
    builder = builder.deferred_activation(wire.deferred_activation);
    if let Some(block) = wire.feed_block {
        builder = builder.feed_block(FeedBlock {
            blocked: block.blocked,
            description: block.description,
        });
    }

    Ok(builder.build())
}
