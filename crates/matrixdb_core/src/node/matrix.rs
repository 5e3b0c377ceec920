//! Matrix (radix trie) node format.

use crate::error::{CoreError, CoreResult};
use crate::store::Store;
use bytes::{Buf, BufMut};

/// Fan-out of a matrix node: one child per decimal hash digit.
pub const MATRIX_FANOUT: usize = 10;

/// A matrix node: one level of the hash trie.
///
/// Each child slot routes one decimal digit of a key's hash, pointing
/// at either a deeper matrix node or the head tower of a bucket skip
/// list; 0 means the slot is unused. The node persists its own
/// `position`, and every read verifies it against the offset the bytes
/// came from - a cheap identity check that catches dangling offsets and
/// stale cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixNode {
    /// Child offsets, indexed by digit (0 = absent).
    pub children: [u64; MATRIX_FANOUT],
    /// The offset this node lives at, persisted for self-checking.
    pub position: u64,
}

impl MatrixNode {
    /// Encoded size: 10 children x 8 + position (8).
    pub const SIZE: usize = MATRIX_FANOUT * 8 + 8;

    /// Creates an empty node destined for `position`.
    #[must_use]
    pub fn new(position: u64) -> Self {
        Self {
            children: [0; MATRIX_FANOUT],
            position,
        }
    }

    /// Returns the child offset for `digit`.
    ///
    /// # Panics
    ///
    /// Panics if `digit` is not a decimal digit.
    #[must_use]
    pub fn child(&self, digit: u8) -> u64 {
        self.children[digit as usize]
    }

    /// Sets the child offset for `digit`.
    ///
    /// # Panics
    ///
    /// Panics if `digit` is not a decimal digit.
    pub fn set_child(&mut self, digit: u8, offset: u64) {
        self.children[digit as usize] = offset;
    }

    /// Returns `true` if no child slot is used.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.iter().all(|&c| c == 0)
    }

    /// Encodes the node to its on-disk form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        for child in self.children {
            buf.put_u64_le(child);
        }
        buf.put_u64_le(self.position);
        buf
    }

    /// Decodes a node read from `position`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptNode`] if the stored position does
    /// not match `position`, or a corruption error on a short buffer.
    pub fn decode(bytes: &[u8], position: u64) -> CoreResult<Self> {
        if bytes.len() < Self::SIZE {
            return Err(CoreError::corrupt_store("matrix node too short"));
        }
        let mut cursor = bytes;
        let mut children = [0u64; MATRIX_FANOUT];
        for child in &mut children {
            *child = cursor.get_u64_le();
        }
        let stored_position = cursor.get_u64_le();

        if stored_position != position {
            return Err(CoreError::CorruptNode {
                expected: position,
                actual: stored_position,
            });
        }

        Ok(Self { children, position })
    }

    /// Reads and decodes a node from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the self-check does.
    pub fn read(store: &Store, position: u64) -> CoreResult<Self> {
        let bytes = store.read(position, Self::SIZE)?;
        Self::decode(&bytes, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn matrix_roundtrip() {
        let mut node = MatrixNode::new(0x540);
        node.set_child(0, 0x1000);
        node.set_child(9, 0x2000);

        let bytes = node.encode();
        assert_eq!(bytes.len(), MatrixNode::SIZE);

        let decoded = MatrixNode::decode(&bytes, 0x540).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(decoded.child(0), 0x1000);
        assert_eq!(decoded.child(5), 0);
        assert_eq!(decoded.child(9), 0x2000);
    }

    #[test]
    fn matrix_position_mismatch_is_corrupt() {
        let node = MatrixNode::new(0x540);
        let result = MatrixNode::decode(&node.encode(), 0x9999);
        assert!(matches!(
            result,
            Err(CoreError::CorruptNode {
                expected: 0x9999,
                actual: 0x540
            })
        ));
    }

    #[test]
    fn matrix_short_buffer_rejected() {
        assert!(MatrixNode::decode(&[0u8; 40], 0).is_err());
    }

    #[test]
    fn matrix_is_empty() {
        let mut node = MatrixNode::new(0x40);
        assert!(node.is_empty());
        node.set_child(3, 0x80);
        assert!(!node.is_empty());
    }

    #[test]
    fn matrix_store_read_roundtrip() {
        let store = Arc::new(Store::in_memory().unwrap());
        let position = store.allocate(MatrixNode::SIZE as u64).unwrap();

        let mut node = MatrixNode::new(position);
        node.set_child(7, 0xABCD);
        store.write(position, &node.encode()).unwrap();

        let read = MatrixNode::read(&store, position).unwrap();
        assert_eq!(read, node);
    }

    #[test]
    fn matrix_read_of_zeroed_region_fails_self_check() {
        let store = Arc::new(Store::in_memory().unwrap());
        let position = store.allocate(MatrixNode::SIZE as u64).unwrap();

        // Allocated but never written: position field reads as 0.
        let result = MatrixNode::read(&store, position);
        assert!(matches!(result, Err(CoreError::CorruptNode { .. })));
    }
}
