//! Map header: the root record anchoring one logical map.

use crate::error::{CoreError, CoreResult};
use crate::store::Store;
use bytes::{Buf, BufMut};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The root record of a logical map.
///
/// A header is the first thing read when a map is opened: `first_node`
/// anchors the structure (a matrix root or a skip-list head tower),
/// `position` is the header's own offset and never changes after
/// creation, and `record_count` tracks the map's logical size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapHeader {
    /// Offset of the map's first node (0 while unanchored).
    pub first_node: u64,
    /// The header's own absolute offset.
    pub position: u64,
    /// Number of live records in the map.
    pub record_count: u64,
}

impl MapHeader {
    /// Encoded size: first_node (8) + position (8) + record_count (8).
    pub const SIZE: usize = 24;

    /// Encodes the header to its on-disk form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.put_u64_le(self.first_node);
        buf.put_u64_le(self.position);
        buf.put_u64_le(self.record_count);
        buf
    }

    /// Decodes a header read from `position`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptNode`] if the stored position does
    /// not match the offset the bytes came from, or a corruption error
    /// on a short buffer.
    pub fn decode(bytes: &[u8], position: u64) -> CoreResult<Self> {
        if bytes.len() < Self::SIZE {
            return Err(CoreError::corrupt_store("map header too short"));
        }
        let mut cursor = bytes;
        let first_node = cursor.get_u64_le();
        let stored_position = cursor.get_u64_le();
        let record_count = cursor.get_u64_le();

        if stored_position != position {
            return Err(CoreError::CorruptNode {
                expected: position,
                actual: stored_position,
            });
        }

        Ok(Self {
            first_node,
            position,
            record_count,
        })
    }
}

/// A live handle on a persisted map header.
///
/// The handle mirrors `first_node` and `record_count` as atomics for
/// cheap reads and writes every change through to the store - the
/// persisted header is authoritative across reopens.
#[derive(Debug)]
pub struct HeaderHandle {
    store: Arc<Store>,
    position: u64,
    first_node: AtomicU64,
    record_count: AtomicU64,
    // Orders write-throughs: the atomics are read inside this lock so
    // an older snapshot can never overwrite a newer one on disk.
    persist_lock: Mutex<()>,
}

impl HeaderHandle {
    /// Allocates and persists a fresh header.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or the initial write fails.
    pub fn create(store: &Arc<Store>) -> CoreResult<Self> {
        let position = store.allocate(MapHeader::SIZE as u64)?;
        let handle = Self {
            store: Arc::clone(store),
            position,
            first_node: AtomicU64::new(0),
            record_count: AtomicU64::new(0),
            persist_lock: Mutex::new(()),
        };
        handle.persist()?;
        Ok(handle)
    }

    /// Loads an existing header from `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the header fails its
    /// position self-check.
    pub fn load(store: &Arc<Store>, position: u64) -> CoreResult<Self> {
        let bytes = store.read(position, MapHeader::SIZE)?;
        let header = MapHeader::decode(&bytes, position)?;
        Ok(Self {
            store: Arc::clone(store),
            position,
            first_node: AtomicU64::new(header.first_node),
            record_count: AtomicU64::new(header.record_count),
            persist_lock: Mutex::new(()),
        })
    }

    /// Returns the header's own offset.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the offset of the map's first node.
    #[must_use]
    pub fn first_node(&self) -> u64 {
        self.first_node.load(Ordering::Acquire)
    }

    /// Re-anchors the map at a new first node.
    ///
    /// # Errors
    ///
    /// Returns an error if the write-through fails.
    pub fn set_first_node(&self, offset: u64) -> CoreResult<()> {
        self.first_node.store(offset, Ordering::Release);
        self.persist()
    }

    /// Returns the number of live records.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count.load(Ordering::Acquire)
    }

    /// Counts one logical insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the write-through fails.
    pub fn increment(&self) -> CoreResult<()> {
        self.record_count.fetch_add(1, Ordering::AcqRel);
        self.persist()
    }

    /// Counts one logical delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the write-through fails.
    pub fn decrement(&self) -> CoreResult<()> {
        self.record_count.fetch_sub(1, Ordering::AcqRel);
        self.persist()
    }

    /// Resets the record count to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the write-through fails.
    pub fn reset_count(&self) -> CoreResult<()> {
        self.record_count.store(0, Ordering::Release);
        self.persist()
    }

    fn persist(&self) -> CoreResult<()> {
        let _ordered = self.persist_lock.lock();
        let header = MapHeader {
            first_node: self.first_node(),
            position: self.position,
            record_count: self.record_count(),
        };
        self.store.write(self.position, &header.encode())
    }
}
