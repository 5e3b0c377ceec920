//! CBOR payload encoding via `ciborium`.
//!
//! [`Value`] implements `Serialize`/`Deserialize` directly, so the
//! CBOR path is a straight pass through `ciborium`. Constructs outside
//! the value model (floats, tags, non-text map keys) are rejected at
//! decode time.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encodes a value as CBOR bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CodecError::Cbor(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or use a CBOR
/// construct this value model does not support.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Cbor(e.to_string()))
}
