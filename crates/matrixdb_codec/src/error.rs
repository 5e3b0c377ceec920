//! Error types for payload encoding and decoding.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// CBOR serialization or deserialization failed.
    #[error("CBOR error: {0}")]
    Cbor(String),

    /// The value cannot be represented by the selected codec.
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    /// An unknown type tag was encountered while decoding.
    #[error("invalid type tag: {0:#04x}")]
    InvalidTag(u8),

    /// The input ended before a complete value was decoded.
    #[error("truncated payload: needed {needed} more bytes, {remaining} remaining")]
    Truncated {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// Bytes were left over after a complete value was decoded.
    #[error("trailing bytes after payload: {0}")]
    TrailingBytes(usize),

    /// A text field was not valid UTF-8.
    #[error("invalid UTF-8 in text payload")]
    InvalidUtf8,
}

impl CodecError {
    /// Creates an unsupported-value error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedValue(message.into())
    }
}
