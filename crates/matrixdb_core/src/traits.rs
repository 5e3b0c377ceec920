//! The map contract shared by the engine's structures.

use crate::error::CoreResult;
use crate::key::MapKey;
use matrixdb_codec::Value;

/// The point-operation contract of a persistent map.
///
/// Implemented by both [`crate::SkipList`] (a single ordered list) and
/// [`crate::HashMatrixMap`] (the same contract sharded across a hash
/// trie), so record and index controllers can hold either behind one
/// interface. Range scans and lazy views stay inherent to each type -
/// their iterator shapes differ.
pub trait PersistentMap<K: MapKey> {
    /// Looks up the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corruption, or codec failure.
    fn get(&self, key: &K) -> CoreResult<Option<Value>>;

    /// Inserts or updates `key`, returning the previous value if any.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corruption, or codec failure.
    fn put(&self, key: &K, value: Value) -> CoreResult<Option<Value>>;

    /// Removes `key`, returning the previous value if it was present.
    /// Removing an absent key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corruption, or codec failure.
    fn remove(&self, key: &K) -> CoreResult<Option<Value>>;

    /// Returns `true` if `key` is present.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or corruption.
    fn contains_key(&self, key: &K) -> CoreResult<bool>;

    /// Returns the number of live records.
    fn len(&self) -> u64;

    /// Returns `true` if the map holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every record by re-anchoring the map on a fresh,
    /// empty structure. Abandoned space is not reclaimed.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn clear(&self) -> CoreResult<()>;
}
