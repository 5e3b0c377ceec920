//! In-memory volume for testing.

use crate::error::{StorageError, StorageResult};
use crate::volume::Volume;
use parking_lot::RwLock;

/// An in-memory volume.
///
/// All data lives in a growable byte vector. Suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral maps that don't need persistence
///
/// # Thread Safety
///
/// The volume is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use matrixdb_storage::{InMemoryVolume, Volume};
///
/// let volume = InMemoryVolume::new();
/// volume.write_at(0, b"test data").unwrap();
/// assert_eq!(volume.len().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVolume {
    data: RwLock<Vec<u8>>,
}

impl InMemoryVolume {
    /// Creates a new empty in-memory volume.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory volume with pre-existing data.
    ///
    /// Useful for testing reopen scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all data in the volume.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl Volume for InMemoryVolume {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let offset_usize = offset as usize;
        let end = offset_usize.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset_usize..end].to_vec())
    }

    fn write_at(&self, offset: u64, new_data: &[u8]) -> StorageResult<()> {
        if new_data.is_empty() {
            return Ok(());
        }

        let mut data = self.data.write();
        let end = offset as usize + new_data.len();

        if end > data.len() {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(new_data);

        Ok(())
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn flush(&self) -> StorageResult<()> {
        // No pending writes in memory
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        // No metadata to sync in memory
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let volume = InMemoryVolume::new();
        assert_eq!(volume.len().unwrap(), 0);
        assert!(volume.is_empty().unwrap());
        assert!(volume.data().is_empty());
    }

    #[test]
    fn memory_write_and_read() {
        let volume = InMemoryVolume::new();
        volume.write_at(0, b"hello world").unwrap();

        let data = volume.read_at(0, 5).unwrap();
        assert_eq!(&data, b"hello");

        let data = volume.read_at(6, 5).unwrap();
        assert_eq!(&data, b"world");
    }

    #[test]
    fn memory_rewrite_in_place() {
        let volume = InMemoryVolume::new();
        volume.write_at(0, b"aaaaaa").unwrap();
        volume.write_at(2, b"bb").unwrap();

        assert_eq!(volume.len().unwrap(), 6);
        assert_eq!(volume.data(), b"aabbaa");
    }

    #[test]
    fn memory_write_past_end_zero_fills_gap() {
        let volume = InMemoryVolume::new();
        volume.write_at(4, b"x").unwrap();

        assert_eq!(volume.len().unwrap(), 5);
        assert_eq!(volume.read_at(0, 4).unwrap(), vec![0u8; 4]);
        assert_eq!(volume.read_at(4, 1).unwrap(), b"x");
    }

    #[test]
    fn memory_read_past_end_fails() {
        let volume = InMemoryVolume::new();
        volume.write_at(0, b"hello").unwrap();

        let result = volume.read_at(10, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_read_extending_past_end_fails() {
        let volume = InMemoryVolume::new();
        volume.write_at(0, b"hello").unwrap();

        let result = volume.read_at(3, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn memory_empty_write() {
        let volume = InMemoryVolume::new();
        volume.write_at(0, b"x").unwrap();

        volume.write_at(100, b"").unwrap();
        assert_eq!(volume.len().unwrap(), 1);
    }

    #[test]
    fn memory_empty_read() {
        let volume = InMemoryVolume::new();
        volume.write_at(0, b"hello").unwrap();

        let data = volume.read_at(2, 0).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn memory_with_data() {
        let volume = InMemoryVolume::with_data(b"preloaded".to_vec());
        assert_eq!(volume.len().unwrap(), 9);
        assert_eq!(volume.read_at(0, 9).unwrap(), b"preloaded");
    }

    #[test]
    fn memory_flush_and_sync_succeed() {
        let volume = InMemoryVolume::new();
        volume.write_at(0, b"data").unwrap();
        assert!(volume.flush().is_ok());
        assert!(volume.sync().is_ok());
    }
}
