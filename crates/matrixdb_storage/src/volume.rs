//! Volume trait definition.

use crate::error::StorageResult;

/// A low-level byte volume for MatrixDB.
///
/// Volumes are **opaque byte stores** addressed by absolute offset. The
/// map engine allocates regions, writes node images into them, and
/// rewrites them in place; volumes only move bytes.
///
/// # Invariants
///
/// - `read_at` returns exactly the bytes most recently written at that
///   offset
/// - `write_at` may extend the volume; any gap between the previous end
///   and the write offset reads back as zeroes
/// - `flush` pushes buffered writes to the OS; `sync` makes them durable
/// - Volumes must be `Send + Sync`; implementations synchronize
///   internally so callers can share one volume across threads
///
/// # Implementors
///
/// - [`crate::InMemoryVolume`] - for tests and ephemeral maps
/// - [`crate::FileVolume`] - for persistent storage
pub trait Volume: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range extends
    /// beyond the current volume size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes `data` at `offset`, extending the volume if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Returns the current size of the volume in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn len(&self) -> StorageResult<u64>;

    /// Returns `true` if the volume holds no bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Flushes all pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - after it returns,
    /// the written bytes survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;
}
