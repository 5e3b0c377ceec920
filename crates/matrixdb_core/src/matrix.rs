//! Hash-matrix map: a radix trie of skip-list buckets.

use crate::cache::NodeCache;
use crate::config::MapConfig;
use crate::error::{CoreError, CoreResult};
use crate::iter::{Dicts, Entries, Keys, MapIter, MatrixWalk, Values};
use crate::key::{digit_path, hash_key, MapKey};
use crate::lock::{DispatchLock, LevelLocks};
use crate::node::{HeaderHandle, MatrixNode};
use crate::skiplist::{EntryRef, SkipList};
use crate::store::Store;
use crate::traits::PersistentMap;
use matrixdb_codec::Value;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A persistent map sharded across a fixed fan-out hash trie.
///
/// Keys are routed digit-by-digit through the most significant decimal
/// digits of their hash; after `load_factor` digits the descent lands
/// on a skip-list bucket holding every key that shares the digit
/// prefix. Matrix nodes and buckets are allocated lazily on first
/// insertion into a slot.
///
/// Concurrent access stripes on the leading hash digit: operations on
/// buckets under different leading digits proceed in parallel, while
/// mutations under one digit serialize through that stripe's write
/// lock. Read-modify-write sequences that must be atomic end to end go
/// through [`HashMatrixMap::update_with`].
///
/// # Example
///
/// ```
/// use matrixdb_core::{HashMatrixMap, MapConfig, PersistentMap, Store, Value};
/// use std::sync::Arc;
///
/// let store = Arc::new(Store::in_memory().unwrap());
/// let map: HashMatrixMap<String> =
///     HashMatrixMap::open(Arc::clone(&store), 0, MapConfig::default()).unwrap();
///
/// map.put(&"a".to_string(), Value::Integer(1)).unwrap();
/// assert_eq!(map.get(&"a".to_string()).unwrap(), Some(Value::Integer(1)));
/// assert_eq!(map.len(), 1);
/// ```
pub struct HashMatrixMap<K: MapKey> {
    store: Arc<Store>,
    header: Arc<HeaderHandle>,
    root: AtomicU64,
    config: MapConfig,
    cache: Arc<NodeCache>,
    locks: LevelLocks,
    dispatch: DispatchLock,
    // Serializes first-use slot creation: the root matrix node is
    // shared by every stripe, so its child array cannot be rewritten
    // under two stripe locks at once.
    structure: Mutex<()>,
    _marker: PhantomData<K>,
}

impl<K: MapKey> HashMatrixMap<K> {
    /// Opens a hash-matrix map anchored in `store`.
    ///
    /// A `header_offset` of 0 creates a fresh map: a new header and an
    /// empty root matrix node. Otherwise the header at that offset is
    /// loaded and its root resolved.
    ///
    /// `config.load_factor` must match the value the map was created
    /// with; the trie depth is baked into the persisted layout.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for an out-of-range load
    /// factor or a header that does not anchor a matrix, and I/O or
    /// corruption errors from the store.
    pub fn open(store: Arc<Store>, header_offset: u64, config: MapConfig) -> CoreResult<Self> {
        config.validate()?;

        let cache = Arc::new(NodeCache::new(config.cache_capacity));
        let locks = LevelLocks::new(config.lock_mode);
        let dispatch = DispatchLock::new(config.lock_mode);

        let (header, root) = if header_offset == 0 {
            let header = Arc::new(HeaderHandle::create(&store)?);
            let root = MatrixNode::new(store.allocate(MatrixNode::SIZE as u64)?);
            cache.put_matrix(&store, &root)?;
            header.set_first_node(root.position)?;
            tracing::debug!(
                header = header.position(),
                root = root.position,
                load_factor = config.load_factor,
                "created hash matrix map"
            );
            (header, root.position)
        } else {
            let header = Arc::new(HeaderHandle::load(&store, header_offset)?);
            let root = header.first_node();
            if root == 0 {
                return Err(CoreError::invalid_config(
                    "header does not anchor a hash matrix",
                ));
            }
            // The self-check distinguishes a matrix root from a header
            // reused against some other structure.
            cache.get_matrix(&store, root).map_err(|e| match e {
                CoreError::CorruptNode { .. } => CoreError::invalid_config(
                    "header anchors a node that is not a matrix root",
                ),
                other => other,
            })?;
            (header, root)
        };

        Ok(Self {
            store,
            header,
            root: AtomicU64::new(root),
            config,
            cache,
            locks,
            dispatch,
            structure: Mutex::new(()),
            _marker: PhantomData,
        })
    }

    /// Returns the offset of this map's header, for reopening.
    #[must_use]
    pub fn header_position(&self) -> u64 {
        self.header.position()
    }

    /// Returns the map's configuration.
    #[must_use]
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Returns the identity-keyed dispatch lock of this map.
    ///
    /// Callers compose it with the point operations for atomic
    /// compute-if-absent style sequences; [`HashMatrixMap::update_with`]
    /// is the common shortcut.
    #[must_use]
    pub fn dispatch(&self) -> &DispatchLock {
        &self.dispatch
    }

    /// Runs `f` holding this map's dispatch lock.
    ///
    /// Two `update_with` sections on the same map are mutually
    /// exclusive, making read-modify-write sequences atomic with
    /// respect to each other.
    ///
    /// # Errors
    ///
    /// Propagates whatever `f` returns.
    pub fn update_with<R>(&self, f: impl FnOnce(&Self) -> CoreResult<R>) -> CoreResult<R> {
        let token = DispatchLock::token_of(self);
        self.dispatch.with_lock(token, || f(self))
    }

    fn root(&self) -> u64 {
        self.root.load(Ordering::Acquire)
    }

    fn digits(&self, key: &K) -> Vec<u8> {
        digit_path(hash_key(&key.encode()), self.config.load_factor)
    }

    fn bucket(&self, head: u64) -> SkipList<K> {
        SkipList::attach(
            Arc::clone(&self.store),
            Arc::clone(&self.header),
            Arc::clone(&self.cache),
            head,
            self.config.serializer_id,
        )
    }

    /// Descends the trie along `digits`, returning the bucket at the
    /// end of the path if every slot on the way is populated.
    fn find_bucket(&self, digits: &[u8]) -> CoreResult<Option<SkipList<K>>> {
        let mut node = self.cache.get_matrix(&self.store, self.root())?;
        for (depth, &digit) in digits.iter().enumerate() {
            let child = node.child(digit);
            if child == 0 {
                return Ok(None);
            }
            if depth + 1 == digits.len() {
                return Ok(Some(self.bucket(child)));
            }
            node = self.cache.get_matrix(&self.store, child)?;
        }
        Ok(None)
    }

    /// Descends along `digits`, allocating matrix nodes and the bucket
    /// skip list on first use of a slot. Caller holds the stripe write
    /// lock; slot creation additionally serializes on the structure
    /// lock and re-checks, because the root node is shared by every
    /// stripe.
    fn find_or_create_bucket(&self, digits: &[u8]) -> CoreResult<SkipList<K>> {
        let mut node = self.cache.get_matrix(&self.store, self.root())?;
        for (depth, &digit) in digits.iter().enumerate() {
            let last = depth + 1 == digits.len();
            let mut child = node.child(digit);

            if child == 0 {
                let _structure = self.structure.lock();
                node = self.cache.get_matrix(&self.store, node.position)?;
                child = node.child(digit);
                if child == 0 {
                    child = if last {
                        let list: SkipList<K> = SkipList::create(
                            Arc::clone(&self.store),
                            Arc::clone(&self.header),
                            Arc::clone(&self.cache),
                            self.config.serializer_id,
                        )?;
                        list.top_head()
                    } else {
                        let fresh =
                            MatrixNode::new(self.store.allocate(MatrixNode::SIZE as u64)?);
                        self.cache.put_matrix(&self.store, &fresh)?;
                        fresh.position
                    };
                    let mut parent = node;
                    parent.set_child(digit, child);
                    self.cache.put_matrix(&self.store, &parent)?;
                }
            }

            if last {
                return Ok(self.bucket(child));
            }
            node = self.cache.get_matrix(&self.store, child)?;
        }

        // load_factor >= 1, so the loop always returns above.
        Err(CoreError::invalid_config("empty digit path"))
    }

    /// Scans the whole map for entries with keys above `key`.
    ///
    /// Gathers the matching references from every bucket and merges
    /// them into ascending key order.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corruption, or codec failure.
    pub fn above(&self, key: &K, inclusive: bool) -> CoreResult<Vec<EntryRef<K>>> {
        self.range_scan(|bucket| bucket.above(key, inclusive))
    }

    /// Scans the whole map for entries with keys below `key`.
    ///
    /// Gathers the matching references from every bucket and merges
    /// them into ascending key order.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corruption, or codec failure.
    pub fn below(&self, key: &K, inclusive: bool) -> CoreResult<Vec<EntryRef<K>>> {
        self.range_scan(|bucket| bucket.below(key, inclusive))
    }

    fn range_scan(
        &self,
        scan: impl Fn(&SkipList<K>) -> CoreResult<crate::skiplist::SkipListIter<K>>,
    ) -> CoreResult<Vec<EntryRef<K>>> {
        let mut out = Vec::new();
        let mut walk = self.walk();
        while let Some(head) = walk.next_head()? {
            let bucket = self.bucket(head);
            for reference in scan(&bucket)? {
                out.push(reference?);
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    fn walk(&self) -> MatrixWalk {
        MatrixWalk::new(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            self.root(),
            self.config.load_factor,
        )
    }

    /// Lazily iterates raw entry references over the whole map.
    ///
    /// Bucket order follows the trie (hash digits), not key order;
    /// within a bucket entries come out key-ascending. Two iterations
    /// over an unmodified map yield identical sequences.
    #[must_use]
    pub fn refs(&self) -> MapIter<K> {
        MapIter::new(Arc::clone(&self.store), Arc::clone(&self.cache), self.walk())
    }

    /// Lazily iterates keys.
    #[must_use]
    pub fn keys(&self) -> Keys<K> {
        Keys::new(self.refs())
    }

    /// Lazily iterates decoded values.
    #[must_use]
    pub fn values(&self) -> Values<K> {
        Values::new(self.refs())
    }

    /// Lazily iterates decoded `(key, value)` entries.
    #[must_use]
    pub fn entries(&self) -> Entries<K> {
        Entries::new(self.refs())
    }

    /// Lazily iterates loosely-typed dictionary projections.
    ///
    /// Each entry becomes a `Value::Map` with `"key"` and `"value"`
    /// slots, for callers that want to inspect a map without knowing
    /// its key type.
    #[must_use]
    pub fn dicts(&self) -> Dicts<K> {
        Dicts::new(self.refs())
    }

    /// Streams every live entry into a freshly-created map.
    ///
    /// This is the explicit maintenance path that reclaims the space
    /// abandoned by value growth and removals: nothing in the engine
    /// compacts automatically. Payload bytes are copied verbatim, so
    /// records keep their original serializer ids. The target is
    /// usually a new store; rebuilding into the same store is legal but
    /// only compacts the layout, not the file.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corruption, or codec failure.
    pub fn rebuild(&self, target: &Arc<Store>) -> CoreResult<Self> {
        let fresh = Self::open(Arc::clone(target), 0, self.config.clone())?;

        let mut copied = 0u64;
        for reference in self.refs() {
            let reference = reference?;
            let payload = self
                .store
                .read(reference.record_position, reference.record_size as usize)?;
            let bucket = fresh.find_or_create_bucket(&fresh.digits(&reference.key))?;
            bucket.put_encoded(&reference.key, &payload, reference.serializer_id)?;
            copied += 1;
        }

        tracing::debug!(records = copied, "rebuilt hash matrix map");
        Ok(fresh)
    }
}

impl<K: MapKey> PersistentMap<K> for HashMatrixMap<K> {
    fn get(&self, key: &K) -> CoreResult<Option<Value>> {
        if self.header.record_count() == 0 {
            return Ok(None);
        }
        let digits = self.digits(key);
        let _stripe = self.locks.read(digits[0]);
        match self.find_bucket(&digits)? {
            Some(bucket) => bucket.get(key),
            None => Ok(None),
        }
    }

    fn put(&self, key: &K, value: Value) -> CoreResult<Option<Value>> {
        let digits = self.digits(key);
        let _stripe = self.locks.write(digits[0]);
        let bucket = self.find_or_create_bucket(&digits)?;
        bucket.put(key, value)
    }

    fn remove(&self, key: &K) -> CoreResult<Option<Value>> {
        let digits = self.digits(key);
        let _stripe = self.locks.write(digits[0]);
        match self.find_bucket(&digits)? {
            Some(bucket) => bucket.remove(key),
            None => Ok(None),
        }
    }

    fn contains_key(&self, key: &K) -> CoreResult<bool> {
        if self.header.record_count() == 0 {
            return Ok(false);
        }
        let digits = self.digits(key);
        let _stripe = self.locks.read(digits[0]);
        match self.find_bucket(&digits)? {
            Some(bucket) => bucket.contains_key(key),
            None => Ok(false),
        }
    }

    fn len(&self) -> u64 {
        self.header.record_count()
    }

    fn clear(&self) -> CoreResult<()> {
        let _stripes = self.locks.write_all();

        self.cache.clear();
        let root = MatrixNode::new(self.store.allocate(MatrixNode::SIZE as u64)?);
        self.cache.put_matrix(&self.store, &root)?;
        self.header.set_first_node(root.position)?;
        self.header.reset_count()?;
        self.root.store(root.position, Ordering::Release);

        tracing::debug!(root = root.position, "cleared hash matrix map");
        Ok(())
    }
}

impl<K: MapKey> std::fmt::Debug for HashMatrixMap<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashMatrixMap")
            .field("header", &self.header.position())
            .field("root", &self.root())
            .field("load_factor", &self.config.load_factor)
            .field("records", &self.header.record_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_map(load_factor: u8) -> (Arc<Store>, HashMatrixMap<i64>) {
        let store = Arc::new(Store::in_memory().unwrap());
        let config = MapConfig::default().load_factor(load_factor);
        let map = HashMatrixMap::open(Arc::clone(&store), 0, config).unwrap();
        (store, map)
    }

    #[test]
    fn empty_map_answers_everything() {
        let (_store, map) = fresh_map(3);
        assert_eq!(map.get(&1).unwrap(), None);
        assert!(!map.contains_key(&1).unwrap());
        assert_eq!(map.remove(&1).unwrap(), None);
        assert_eq!(map.len(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn put_get_remove_roundtrip() {
        let (_store, map) = fresh_map(2);

        for k in 0..100i64 {
            assert_eq!(map.put(&k, Value::Integer(k * 10)).unwrap(), None);
        }
        assert_eq!(map.len(), 100);

        for k in 0..100i64 {
            assert_eq!(map.get(&k).unwrap(), Some(Value::Integer(k * 10)));
            assert!(map.contains_key(&k).unwrap());
        }

        for k in 0..50i64 {
            assert_eq!(map.remove(&k).unwrap(), Some(Value::Integer(k * 10)));
        }
        assert_eq!(map.len(), 50);
        assert_eq!(map.get(&10).unwrap(), None);
        assert_eq!(map.get(&70).unwrap(), Some(Value::Integer(700)));
    }

    #[test]
    fn every_load_factor_works() {
        for load_factor in 1..=10u8 {
            let (_store, map) = fresh_map(load_factor);
            for k in 0..25i64 {
                map.put(&k, Value::Integer(k)).unwrap();
            }
            assert_eq!(map.len(), 25, "load_factor {load_factor}");
            for k in 0..25i64 {
                assert_eq!(
                    map.get(&k).unwrap(),
                    Some(Value::Integer(k)),
                    "load_factor {load_factor}"
                );
            }
        }
    }

    #[test]
    fn invalid_load_factor_rejected() {
        let store = Arc::new(Store::in_memory().unwrap());
        for bad in [0u8, 11] {
            let config = MapConfig::default().load_factor(bad);
            let result: CoreResult<HashMatrixMap<i64>> =
                HashMatrixMap::open(Arc::clone(&store), 0, config);
            assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
        }
    }

    #[test]
    fn header_of_skip_list_rejected_as_matrix() {
        let store = Arc::new(Store::in_memory().unwrap());
        let list: SkipList<i64> =
            SkipList::open(Arc::clone(&store), 0, crate::store::SERIALIZER_BINARY).unwrap();
        list.put(&1, Value::Integer(1)).unwrap();

        let result: CoreResult<HashMatrixMap<i64>> = HashMatrixMap::open(
            Arc::clone(&store),
            list.header_position(),
            MapConfig::default(),
        );
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn survives_reopen() {
        let store = Arc::new(Store::in_memory().unwrap());
        let header_position;
        {
            let map: HashMatrixMap<String> =
                HashMatrixMap::open(Arc::clone(&store), 0, MapConfig::default().load_factor(2))
                    .unwrap();
            map.put(&"k".to_string(), Value::Text("v".into())).unwrap();
            header_position = map.header_position();
        }

        let map: HashMatrixMap<String> = HashMatrixMap::open(
            Arc::clone(&store),
            header_position,
            MapConfig::default().load_factor(2),
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(&"k".to_string()).unwrap(),
            Some(Value::Text("v".into()))
        );
    }

    #[test]
    fn clear_empties_and_stays_usable() {
        let (_store, map) = fresh_map(2);
        for k in 0..20i64 {
            map.put(&k, Value::Integer(k)).unwrap();
        }

        map.clear().unwrap();
        assert_eq!(map.len(), 0);
        assert_eq!(map.get(&5).unwrap(), None);

        map.put(&5, Value::Integer(55)).unwrap();
        assert_eq!(map.get(&5).unwrap(), Some(Value::Integer(55)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn update_with_is_atomic_section() {
        let (_store, map) = fresh_map(2);
        map.put(&1, Value::Integer(1)).unwrap();

        let result = map
            .update_with(|m| {
                let current = m.get(&1)?.and_then(|v| v.as_integer()).unwrap_or(0);
                m.put(&1, Value::Integer(current + 41))?;
                m.get(&1)
            })
            .unwrap();

        assert_eq!(result, Some(Value::Integer(42)));
    }

    #[test]
    fn rebuild_compacts_into_fresh_store() {
        let (_store, map) = fresh_map(2);
        for k in 0..50i64 {
            map.put(&k, Value::Integer(k)).unwrap();
        }
        // Churn: grow payloads and delete half, abandoning regions.
        for k in 0..50i64 {
            map.put(&k, Value::Text(format!("padded-value-{k}"))).unwrap();
        }
        for k in (0..50i64).step_by(2) {
            map.remove(&k).unwrap();
        }

        let target = Arc::new(Store::in_memory().unwrap());
        let rebuilt = map.rebuild(&target).unwrap();

        assert_eq!(rebuilt.len(), 25);
        for k in 0..50i64 {
            let expected = (k % 2 == 1).then(|| Value::Text(format!("padded-value-{k}")));
            assert_eq!(rebuilt.get(&k).unwrap(), expected);
        }
        // The compacted store is smaller than the churned one.
        assert!(target.len().unwrap() < map.store.len().unwrap());
    }
}
