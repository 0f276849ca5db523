//! Compression glue for encoded bundles.
//!
//! The set of algorithms is fixed by the wire format, so it is a closed enum
//! keyed by the one-byte identifier sent alongside every payload.

use crate::error::CodecError;
use flate2::Compression;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Upper bound for pre-allocating a decompression buffer from an untrusted size.
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CompressionType {
    None,
    /// Sender tried compressing and the result was not smaller.
    Incompressible,
    /// Raw deflate at the fastest level.
    Fast,
    /// Zlib at the best compression level.
    HighRatio,
}

impl CompressionType {
    pub fn id(self) -> u8 {
        match self {
            CompressionType::None => 0,
            CompressionType::Incompressible => 5,
            CompressionType::Fast => 6,
            CompressionType::HighRatio => 7,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, CodecError> {
        match id {
            0 => Ok(CompressionType::None),
            5 => Ok(CompressionType::Incompressible),
            6 => Ok(CompressionType::Fast),
            7 => Ok(CompressionType::HighRatio),
            other => Err(CodecError::UnknownCompression(other)),
        }
    }

    pub fn is_compressed(self) -> bool {
        matches!(self, CompressionType::Fast | CompressionType::HighRatio)
    }
}

/// Compresses `raw` with `preferred`, keeping the result only when it is smaller.
///
/// Returns the algorithm actually recorded together with the bytes to send.
pub fn compress(preferred: CompressionType, raw: Vec<u8>) -> (CompressionType, Vec<u8>) {
    if raw.is_empty() {
        return (CompressionType::None, raw);
    }

    let compressed = match preferred {
        CompressionType::Fast => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
            encoder.write_all(&raw).and_then(|_| encoder.finish())
        }
        CompressionType::HighRatio => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(&raw).and_then(|_| encoder.finish())
        }
        CompressionType::None | CompressionType::Incompressible => {
            return (CompressionType::None, raw);
        }
    };

    match compressed {
        Ok(bytes) if bytes.len() < raw.len() => (preferred, bytes),
        Ok(_) => (CompressionType::None, raw),
        Err(e) => {
            tracing::warn!("Compression with {:?} failed, sending raw: {}", preferred, e);
            (CompressionType::None, raw)
        }
    }
}

/// Inverts [`compress`], requiring exactly `uncompressed_size` bytes of output.
pub fn decompress(
    compression: CompressionType,
    uncompressed_size: i32,
    payload: &[u8],
) -> Result<Vec<u8>, CodecError> {
    let expected = usize::try_from(uncompressed_size).map_err(|_| {
        CodecError::Malformed(format!("negative uncompressed size {}", uncompressed_size))
    })?;

    let mut output = Vec::new();
    // One byte past the expected size detects payloads that inflate too far.
    let limit = expected as u64 + 1;
    let read = match compression {
        CompressionType::Fast => {
            output.reserve(expected.min(MAX_PREALLOCATION));
            DeflateDecoder::new(payload).take(limit).read_to_end(&mut output)
        }
        CompressionType::HighRatio => {
            output.reserve(expected.min(MAX_PREALLOCATION));
            ZlibDecoder::new(payload).take(limit).read_to_end(&mut output)
        }
        CompressionType::None | CompressionType::Incompressible => {
            if payload.len() != expected {
                return Err(CodecError::Truncated(format!(
                    "expected {} uncompressed bytes, got {}",
                    expected,
                    payload.len()
                )));
            }
            return Ok(payload.to_vec());
        }
    };

    match read {
        Ok(len) if len == expected => Ok(output),
        Ok(len) if len < expected => Err(CodecError::Truncated(format!(
            "decompressed {} bytes, expected {}",
            len, expected
        ))),
        Ok(_) => Err(CodecError::Malformed(format!(
            "payload inflates beyond declared size {}",
            expected
        ))),
        Err(e) => Err(CodecError::Malformed(format!(
            "{:?} decompression failed: {}",
            compression, e
        ))),
    }
}
