//! Skip-list node formats.

use crate::error::{CoreError, CoreResult};
use crate::store::Store;
use bytes::{Buf, BufMut};

/// A skip-list head node: one level of a list's anchor tower.
///
/// `next` links nodes at the same level in ascending key order; `down`
/// points to the head one level below (0 at level 0). Head nodes carry
/// no key - they sort before every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipHeadNode {
    /// This node's level; level 0 is the base list.
    pub level: u8,
    /// Offset of the next node at this level (0 = end of chain).
    pub next: u64,
    /// Offset of the head one level down (0 = base level).
    pub down: u64,
    /// The offset this node lives at (contextual, not persisted).
    pub position: u64,
}

impl SkipHeadNode {
    /// Encoded size: next (8) + down (8) + level (1).
    pub const SIZE: usize = 17;

    /// Encodes the head node to its on-disk form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.put_u64_le(self.next);
        buf.put_u64_le(self.down);
        buf.put_u8(self.level);
        buf
    }

    /// Decodes a head node read from `position`.
    ///
    /// # Errors
    ///
    /// Returns a corruption error on a short buffer.
    pub fn decode(bytes: &[u8], position: u64) -> CoreResult<Self> {
        if bytes.len() < Self::SIZE {
            return Err(CoreError::corrupt_store("skip head node too short"));
        }
        let mut cursor = bytes;
        let next = cursor.get_u64_le();
        let down = cursor.get_u64_le();
        let level = cursor.get_u8();

        Ok(Self {
            level,
            next,
            down,
            position,
        })
    }

    /// Reads and decodes a head node from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the bytes are malformed.
    pub fn read(store: &Store, position: u64) -> CoreResult<Self> {
        let bytes = store.read(position, Self::SIZE)?;
        Self::decode(&bytes, position)
    }
}

/// A skip-list entry node: one level of one key's tower.
///
/// Extends the head layout with the record metadata and the key itself,
/// persisted inline. Every level of a tower repeats the key; the record
/// fields are kept consistent across the tower on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipEntryNode {
    /// This node's level.
    pub level: u8,
    /// Offset of the next node at this level (0 = end of chain).
    pub next: u64,
    /// Offset of this key's node one level down (0 = base level).
    pub down: u64,
    /// The offset this node lives at (contextual, not persisted).
    pub position: u64,
    /// Offset of the serialized value payload.
    pub record_position: u64,
    /// Exact length of the serialized value payload.
    pub record_size: u32,
    /// Id of the codec that produced the payload.
    pub serializer_id: u32,
    /// The key's encoded bytes.
    pub key_bytes: Vec<u8>,
}

impl SkipEntryNode {
    /// Size of everything before the key bytes: head fields (17) +
    /// record_position (8) + record_size (4) + serializer_id (4) +
    /// key_len (2).
    pub const FIXED_SIZE: usize = 35;

    /// Returns the encoded size of an entry node for a key of
    /// `key_len` bytes.
    #[must_use]
    pub const fn encoded_size_for(key_len: usize) -> usize {
        Self::FIXED_SIZE + key_len
    }

    /// Returns this node's encoded size.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::encoded_size_for(self.key_bytes.len())
    }

    /// Encodes the entry node to its on-disk form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.put_u64_le(self.next);
        buf.put_u64_le(self.down);
        buf.put_u8(self.level);
        buf.put_u64_le(self.record_position);
        buf.put_u32_le(self.record_size);
        buf.put_u32_le(self.serializer_id);
        buf.put_u16_le(self.key_bytes.len() as u16);
        buf.put_slice(&self.key_bytes);
        buf
    }

    /// Decodes an entry node read from `position`.
    ///
    /// The buffer must contain the full node including key bytes.
    ///
    /// # Errors
    ///
    /// Returns a corruption error on a short buffer.
    pub fn decode(bytes: &[u8], position: u64) -> CoreResult<Self> {
        if bytes.len() < Self::FIXED_SIZE {
            return Err(CoreError::corrupt_store("skip entry node too short"));
        }
        let mut cursor = bytes;
        let next = cursor.get_u64_le();
        let down = cursor.get_u64_le();
        let level = cursor.get_u8();
        let record_position = cursor.get_u64_le();
        let record_size = cursor.get_u32_le();
        let serializer_id = cursor.get_u32_le();
        let key_len = cursor.get_u16_le() as usize;

        if cursor.remaining() < key_len {
            return Err(CoreError::corrupt_store("skip entry node key truncated"));
        }
        let key_bytes = cursor[..key_len].to_vec();

        Ok(Self {
            level,
            next,
            down,
            position,
            record_position,
            record_size,
            serializer_id,
            key_bytes,
        })
    }

    /// Reads and decodes an entry node from the store.
    ///
    /// Two reads: the fixed prefix tells us the key length, then the
    /// key follows.
    ///
    /// # Errors
    ///
    /// Returns an error if a read fails or the bytes are malformed.
    pub fn read(store: &Store, position: u64) -> CoreResult<Self> {
        let fixed = store.read(position, Self::FIXED_SIZE)?;
        let key_len =
            u16::from_le_bytes([fixed[Self::FIXED_SIZE - 2], fixed[Self::FIXED_SIZE - 1]])
                as usize;

        let mut full = fixed;
        if key_len > 0 {
            let key = store.read(position + Self::FIXED_SIZE as u64, key_len)?;
            full.extend_from_slice(&key);
        }
        Self::decode(&full, position)
    }
}
