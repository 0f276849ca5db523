//! Bundle Codec Module
//!
//! Lossless, compact serialization of state bundles for the publish RPC.
//!
//! ## Wire Layout
//! - **Structured payload**: JSON document with the textual baseline, per-space
//!   overrides and optional deferred-activation / feed-block markers.
//! - **Compression**: Applied only when it makes the payload smaller. The
//!   algorithm id and uncompressed size always travel with the payload.
//! - **Envelope**: Optional single-blob framing (`bincode`) that prefixes the
//!   compression metadata, for streams and storage.

pub mod bundle_codec;
pub mod compression;
pub mod types;

pub use bundle_codec::BundleCodec;
pub use compression::CompressionType;
pub use types::EncodedBundle;
