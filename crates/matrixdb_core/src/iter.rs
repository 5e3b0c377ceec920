//! Lazy iteration over a hash-matrix map.
//!
//! Iteration never materializes the map: an explicit stack of pending
//! matrix descents feeds a second stack of reached bucket heads, and
//! one bucket's level-0 chain is drained at a time. Iterators are
//! forward-only and re-creatable from scratch; dropping one is the
//! cooperative cancellation point for long walks.

use crate::cache::NodeCache;
use crate::error::CoreResult;
use crate::key::MapKey;
use crate::skiplist::{EntryRef, SkipListIter};
use crate::store::Store;
use matrixdb_codec::Value;
use std::sync::Arc;

/// Depth-first walk over the matrix trie, yielding bucket head offsets.
///
/// Popping a pending node pushes its non-empty children: deeper matrix
/// nodes until `load_factor - 1` descents have happened, bucket heads
/// after. The walk order is deterministic, so repeated walks over an
/// unmodified map agree.
pub(crate) struct MatrixWalk {
    store: Arc<Store>,
    cache: Arc<NodeCache>,
    pending: Vec<(u64, u8)>,
    heads: Vec<u64>,
    load_factor: u8,
}

impl MatrixWalk {
    pub(crate) fn new(
        store: Arc<Store>,
        cache: Arc<NodeCache>,
        root: u64,
        load_factor: u8,
    ) -> Self {
        Self {
            store,
            cache,
            pending: vec![(root, 0)],
            heads: Vec::new(),
            load_factor,
        }
    }

    /// Returns the next bucket head offset, or `None` when the trie is
    /// exhausted.
    pub(crate) fn next_head(&mut self) -> CoreResult<Option<u64>> {
        loop {
            if let Some(head) = self.heads.pop() {
                return Ok(Some(head));
            }

            let Some((offset, depth)) = self.pending.pop() else {
                return Ok(None);
            };

            let node = self.cache.get_matrix(&self.store, offset)?;
            for &child in &node.children {
                if child == 0 {
                    continue;
                }
                if depth + 1 == self.load_factor {
                    self.heads.push(child);
                } else {
                    self.pending.push((child, depth + 1));
                }
            }
        }
    }
}

/// Lazy iterator over every entry reference in a map.
///
/// Entries come out bucket by bucket in trie order; within a bucket
/// they are key-ascending.
pub struct MapIter<K: MapKey> {
    store: Arc<Store>,
    cache: Arc<NodeCache>,
    walk: MatrixWalk,
    current: Option<SkipListIter<K>>,
    finished: bool,
}

impl<K: MapKey> MapIter<K> {
    pub(crate) fn new(store: Arc<Store>, cache: Arc<NodeCache>, walk: MatrixWalk) -> Self {
        Self {
            store,
            cache,
            walk,
            current: None,
            finished: false,
        }
    }
}

impl<K: MapKey> Iterator for MapIter<K> {
    type Item = CoreResult<EntryRef<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(bucket) = &mut self.current {
                match bucket.next() {
                    Some(Ok(reference)) => return Some(Ok(reference)),
                    Some(Err(e)) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }

            match self.walk.next_head() {
                Ok(Some(head)) => {
                    match SkipListIter::from_head(Arc::clone(&self.store), &self.cache, head) {
                        Ok(iter) => self.current = Some(iter),
                        Err(e) => {
                            self.finished = true;
                            return Some(Err(e));
                        }
                    }
                }
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Lazy key view over a map.
pub struct Keys<K: MapKey> {
    inner: MapIter<K>,
}

impl<K: MapKey> Keys<K> {
    pub(crate) fn new(inner: MapIter<K>) -> Self {
        Self { inner }
    }
}

impl<K: MapKey> Iterator for Keys<K> {
    type Item = CoreResult<K>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.inner.next()?.map(|reference| reference.key))
    }
}

/// Lazy value view over a map. Payloads are loaded and decoded one at
/// a time.
pub struct Values<K: MapKey> {
    inner: MapIter<K>,
}

impl<K: MapKey> Values<K> {
    pub(crate) fn new(inner: MapIter<K>) -> Self {
        Self { inner }
    }
}

impl<K: MapKey> Iterator for Values<K> {
    type Item = CoreResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let reference = match self.inner.next()? {
            Ok(reference) => reference,
            Err(e) => return Some(Err(e)),
        };
        Some(reference.load(&self.inner.store))
    }
}

/// Lazy entry view over a map: decoded `(key, value)` pairs.
pub struct Entries<K: MapKey> {
    inner: MapIter<K>,
}

impl<K: MapKey> Entries<K> {
    pub(crate) fn new(inner: MapIter<K>) -> Self {
        Self { inner }
    }
}

impl<K: MapKey> Iterator for Entries<K> {
    type Item = CoreResult<(K, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        let reference = match self.inner.next()? {
            Ok(reference) => reference,
            Err(e) => return Some(Err(e)),
        };
        match reference.load(&self.inner.store) {
            Ok(value) => Some(Ok((reference.key, value))),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Lazy dictionary view over a map.
///
/// Every entry is projected into a loosely-typed `Value::Map` with
/// `"key"` and `"value"` slots, so callers can inspect a map without
/// naming its key type.
pub struct Dicts<K: MapKey> {
    inner: MapIter<K>,
}

impl<K: MapKey> Dicts<K> {
    pub(crate) fn new(inner: MapIter<K>) -> Self {
        Self { inner }
    }
}

impl<K: MapKey> Iterator for Dicts<K> {
    type Item = CoreResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let reference = match self.inner.next()? {
            Ok(reference) => reference,
            Err(e) => return Some(Err(e)),
        };
        match reference.load(&self.inner.store) {
            Ok(value) => Some(Ok(Value::Map(vec![
                ("key".to_string(), reference.key.to_value()),
                ("value".to_string(), value),
            ]))),
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::matrix::HashMatrixMap;
    use crate::traits::PersistentMap;
    use std::collections::BTreeSet;

    fn populated_map() -> HashMatrixMap<i64> {
        let store = Arc::new(Store::in_memory().unwrap());
        let map =
            HashMatrixMap::open(store, 0, MapConfig::default().load_factor(2)).unwrap();
        for k in 0..200i64 {
            map.put(&k, Value::Integer(k * 3)).unwrap();
        }
        map
    }

    #[test]
    fn refs_cover_every_entry_exactly_once() {
        let map = populated_map();
        let keys: Vec<i64> = map.refs().map(|r| r.unwrap().key).collect();

        assert_eq!(keys.len(), 200);
        let unique: BTreeSet<i64> = keys.iter().copied().collect();
        assert_eq!(unique.len(), 200);
        assert_eq!(unique, (0..200).collect());
    }

    #[test]
    fn iteration_is_repeatable() {
        let map = populated_map();

        let first: Vec<i64> = map.refs().map(|r| r.unwrap().key).collect();
        let second: Vec<i64> = map.refs().map(|r| r.unwrap().key).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn keys_values_entries_agree() {
        let map = populated_map();

        let keys: BTreeSet<i64> = map.keys().map(|k| k.unwrap()).collect();
        let values: BTreeSet<i64> = map
            .values()
            .map(|v| v.unwrap().as_integer().unwrap())
            .collect();
        let entries: Vec<(i64, Value)> = map.entries().map(|e| e.unwrap()).collect();

        assert_eq!(keys.len(), 200);
        assert_eq!(values, keys.iter().map(|k| k * 3).collect());
        for (key, value) in entries {
            assert_eq!(value, Value::Integer(key * 3));
        }
    }

    #[test]
    fn dicts_project_key_and_value() {
        let store = Arc::new(Store::in_memory().unwrap());
        let map: HashMatrixMap<String> =
            HashMatrixMap::open(store, 0, MapConfig::default()).unwrap();
        map.put(&"answer".to_string(), Value::Integer(42)).unwrap();

        let dicts: Vec<Value> = map.dicts().map(|d| d.unwrap()).collect();
        assert_eq!(dicts.len(), 1);
        assert_eq!(dicts[0].get("key"), Some(&Value::Text("answer".into())));
        assert_eq!(dicts[0].get("value"), Some(&Value::Integer(42)));
    }

    #[test]
    fn empty_map_iterates_nothing() {
        let store = Arc::new(Store::in_memory().unwrap());
        let map: HashMatrixMap<i64> =
            HashMatrixMap::open(store, 0, MapConfig::default()).unwrap();
        assert_eq!(map.refs().count(), 0);
    }

    #[test]
    fn sparse_trie_is_tolerated() {
        let store = Arc::new(Store::in_memory().unwrap());
        let map: HashMatrixMap<i64> =
            HashMatrixMap::open(store, 0, MapConfig::default().load_factor(10)).unwrap();
        // A handful of keys in a depth-10 trie leaves most slots empty.
        for k in [1i64, 1000, -77] {
            map.put(&k, Value::Integer(k)).unwrap();
        }

        let keys: BTreeSet<i64> = map.keys().map(|k| k.unwrap()).collect();
        assert_eq!(keys, [1i64, 1000, -77].into_iter().collect());
    }
}
