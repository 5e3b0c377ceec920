//! # MatrixDB Codec
//!
//! Payload codecs for MatrixDB records.
//!
//! Every record in a store carries a small integer serializer id; the
//! id resolves, through the store's registry, to one of the codecs in
//! this crate (or a caller-registered one). All codecs speak the same
//! dynamic [`Value`] type, so heterogeneous payloads can live side by
//! side in one map.
//!
//! Provided codecs:
//!
//! - [`RawCodec`] - byte-string passthrough, zero overhead
//! - [`BinaryCodec`] - compact tagged little-endian format
//! - [`CborCodec`] - CBOR via `ciborium`, for interchange with other
//!   tooling
//!
//! ## Usage
//!
//! ```
//! use matrixdb_codec::{BinaryCodec, PayloadCodec, Value};
//!
//! let codec = BinaryCodec;
//! let bytes = codec.encode(&Value::Integer(42)).unwrap();
//! assert_eq!(codec.decode(&bytes).unwrap(), Value::Integer(42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binary;
mod cbor;
mod error;
mod value;

pub use binary::{from_binary, to_binary};
pub use cbor::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use value::Value;

/// A payload codec resolvable through a serializer registry.
///
/// Implementations must be deterministic: encoding the same value twice
/// yields the same bytes, and `decode(encode(v)) == v`.
pub trait PayloadCodec: Send + Sync {
    /// A short stable name for diagnostics.
    fn name(&self) -> &'static str;

    /// Encodes a value to payload bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented.
    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>>;

    /// Decodes a value from payload bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid payload.
    fn decode(&self, bytes: &[u8]) -> CodecResult<Value>;
}

/// Byte-string passthrough codec.
///
/// Only [`Value::Bytes`] payloads are accepted; the stored bytes are
/// the value itself with no framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl PayloadCodec for RawCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            other => Err(CodecError::unsupported(format!(
                "raw codec stores byte strings only, got {other:?}"
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        Ok(Value::Bytes(bytes.to_vec()))
    }
}

/// Compact tagged little-endian codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl PayloadCodec for BinaryCodec {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        Ok(to_binary(value))
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        from_binary(bytes)
    }
}

/// CBOR codec backed by `ciborium`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl PayloadCodec for CborCodec {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        to_cbor(value)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codec_is_passthrough() {
        let codec = RawCodec;
        let bytes = codec.encode(&Value::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(codec.decode(&bytes).unwrap(), Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn raw_codec_rejects_non_bytes() {
        let codec = RawCodec;
        assert!(codec.encode(&Value::Integer(1)).is_err());
    }

    #[test]
    fn all_codecs_roundtrip_bytes() {
        let value = Value::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        for codec in [&RawCodec as &dyn PayloadCodec, &BinaryCodec, &CborCodec] {
            let bytes = codec.encode(&value).unwrap();
            assert_eq!(codec.decode(&bytes).unwrap(), value, "{}", codec.name());
        }
    }

    #[test]
    fn codec_names() {
        assert_eq!(RawCodec.name(), "raw");
        assert_eq!(BinaryCodec.name(), "binary");
        assert_eq!(CborCodec.name(), "cbor");
    }
}
