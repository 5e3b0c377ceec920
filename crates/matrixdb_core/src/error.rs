//! Error types for the map engine.

use thiserror::Error;

/// Result type for map engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in map engine operations.
///
/// The engine never retries and never substitutes defaults: corruption
/// and I/O failures abort the enclosing operation and propagate to the
/// caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Volume read or write failed.
    #[error("storage error: {0}")]
    Storage(#[from] matrixdb_storage::StorageError),

    /// Payload codec failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] matrixdb_codec::CodecError),

    /// The store's contents are inconsistent with its own bookkeeping.
    #[error("corrupt store: {message}")]
    CorruptStore {
        /// Description of the inconsistency.
        message: String,
    },

    /// A node's self-reported position does not match the offset it was
    /// read from.
    #[error("corrupt node: read at {expected:#x}, self-reports {actual:#x}")]
    CorruptNode {
        /// The offset the node was read from.
        expected: u64,
        /// The position the node claims to live at.
        actual: u64,
    },

    /// A persisted key could not be decoded.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the decode failure.
        message: String,
    },

    /// Invalid construction parameters or a header reused against an
    /// incompatible map type.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a corrupt store error.
    pub fn corrupt_store(message: impl Into<String>) -> Self {
        Self::CorruptStore {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
