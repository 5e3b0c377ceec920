//! Error types for volume operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for volume operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during volume operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the volume.
    #[error("read beyond end of volume: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current volume size.
        size: u64,
    },

    /// The volume file is locked by another process.
    #[error("volume is locked by another process: {path}")]
    Locked {
        /// Path to the locked file.
        path: PathBuf,
    },
}
