//! Disk-resident probabilistic skip list.
//!
//! A list is anchored by a tower of head nodes (one per level, linked
//! by `down`) whose topmost node a map header or matrix slot points at.
//! Entry towers are inserted with coin-flip level selection; the level-0
//! chain holds every key in ascending order, so range scans and full
//! iteration walk level 0 while point searches drop through the upper
//! levels.
//!
//! The list synchronizes nothing itself beyond the store's own byte
//! locking: callers choose the granularity - the hash matrix wraps
//! bucket mutation in its level locks, and standalone lists rely on a
//! dispatch lock or external synchronization.

use crate::cache::NodeCache;
use crate::error::{CoreError, CoreResult};
use crate::key::MapKey;
use crate::node::{HeaderHandle, SkipEntryNode, SkipHeadNode};
use crate::store::Store;
use crate::traits::PersistentMap;
use matrixdb_codec::Value;
use rand::Rng;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Maximum tower height. With p = 1/2 this comfortably covers bucket
/// chains far beyond what a sensible load factor produces.
pub const MAX_LEVEL: u8 = 8;

/// Node cache capacity for standalone lists.
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// A node encountered during traversal: a head (sorts before every
/// key) or an entry.
enum Link {
    Head(SkipHeadNode),
    Entry(SkipEntryNode),
}

impl Link {
    fn next(&self) -> u64 {
        match self {
            Link::Head(n) => n.next,
            Link::Entry(n) => n.next,
        }
    }

    fn down(&self) -> u64 {
        match self {
            Link::Head(n) => n.down,
            Link::Entry(n) => n.down,
        }
    }

    fn position(&self) -> u64 {
        match self {
            Link::Head(n) => n.position,
            Link::Entry(n) => n.position,
        }
    }

    fn is_head(&self) -> bool {
        matches!(self, Link::Head(_))
    }
}

/// One level of a search path: the last node strictly before the
/// target, and what followed it at visit time.
struct PathLevel {
    pred_position: u64,
    pred_is_head: bool,
    next: u64,
    matches: bool,
}

/// A full search path, top level first, plus the level-0 match if any.
struct Location {
    levels: Vec<PathLevel>,
    target: Option<SkipEntryNode>,
}

impl Location {
    fn at_level(&self, level: u8) -> &PathLevel {
        &self.levels[self.levels.len() - 1 - level as usize]
    }
}

/// A resolved reference to one stored entry.
///
/// References carry the decoded key and the record metadata needed to
/// load the value on demand; range scans and the raw iteration views
/// yield these instead of eagerly materializing payloads.
#[derive(Debug, Clone)]
pub struct EntryRef<K> {
    /// The decoded key.
    pub key: K,
    /// Offset of the level-0 entry node.
    pub node_position: u64,
    /// Offset of the serialized value payload.
    pub record_position: u64,
    /// Exact length of the serialized value payload.
    pub record_size: u32,
    /// Id of the codec that produced the payload.
    pub serializer_id: u32,
}

impl<K> EntryRef<K> {
    /// Loads and decodes the referenced value from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload read fails or the codec rejects
    /// the bytes.
    pub fn load(&self, store: &Store) -> CoreResult<Value> {
        let payload = store.read(self.record_position, self.record_size as usize)?;
        let codec = store.serializer(self.serializer_id)?;
        Ok(codec.decode(&payload)?)
    }
}

/// A persistent skip list over a store.
///
/// Standalone lists own their header (see [`SkipList::open`]); the hash
/// matrix attaches bucket lists that share the map's header and node
/// cache, so every bucket accounts into one record count.
pub struct SkipList<K: MapKey> {
    store: Arc<Store>,
    header: Arc<HeaderHandle>,
    cache: Arc<NodeCache>,
    top_head: AtomicU64,
    serializer_id: u32,
    _marker: PhantomData<K>,
}

impl<K: MapKey> SkipList<K> {
    /// Opens a standalone skip-list map.
    ///
    /// A `header_offset` of 0 creates a fresh header and head tower;
    /// otherwise the header at that offset is loaded and the anchored
    /// list attached.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, a corrupt header, or a header
    /// that anchors nothing.
    pub fn open(store: Arc<Store>, header_offset: u64, serializer_id: u32) -> CoreResult<Self> {
        let cache = Arc::new(NodeCache::new(DEFAULT_CACHE_CAPACITY));
        if header_offset == 0 {
            let header = Arc::new(HeaderHandle::create(&store)?);
            let list = Self::create(store, header, cache, serializer_id)?;
            list.header.set_first_node(list.top_head())?;
            Ok(list)
        } else {
            let header = Arc::new(HeaderHandle::load(&store, header_offset)?);
            let top = header.first_node();
            if top == 0 {
                return Err(CoreError::invalid_config(
                    "header does not anchor a skip list",
                ));
            }
            Ok(Self::attach(store, header, cache, top, serializer_id))
        }
    }

    /// Creates a fresh list: allocates the full head tower and links it
    /// by `down`, bottom level first.
    pub(crate) fn create(
        store: Arc<Store>,
        header: Arc<HeaderHandle>,
        cache: Arc<NodeCache>,
        serializer_id: u32,
    ) -> CoreResult<Self> {
        let mut down = 0u64;
        for level in 0..MAX_LEVEL {
            let position = store.allocate(SkipHeadNode::SIZE as u64)?;
            let node = SkipHeadNode {
                level,
                next: 0,
                down,
                position,
            };
            cache.put_head(&store, &node)?;
            down = position;
        }

        Ok(Self {
            store,
            header,
            cache,
            top_head: AtomicU64::new(down),
            serializer_id,
            _marker: PhantomData,
        })
    }

    /// Attaches to an existing list anchored at `top_head`.
    pub(crate) fn attach(
        store: Arc<Store>,
        header: Arc<HeaderHandle>,
        cache: Arc<NodeCache>,
        top_head: u64,
        serializer_id: u32,
    ) -> Self {
        Self {
            store,
            header,
            cache,
            top_head: AtomicU64::new(top_head),
            serializer_id,
            _marker: PhantomData,
        }
    }

    /// Returns the offset of the topmost head node.
    #[must_use]
    pub fn top_head(&self) -> u64 {
        self.top_head.load(AtomicOrdering::Acquire)
    }

    /// Returns the offset of this list's header.
    #[must_use]
    pub fn header_position(&self) -> u64 {
        self.header.position()
    }

    /// Looks up the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corruption, or codec failure.
    pub fn get(&self, key: &K) -> CoreResult<Option<Value>> {
        match self.find_entry(key)? {
            Some(entry) => Ok(Some(self.load_value(&entry)?)),
            None => Ok(None),
        }
    }

    /// Returns `true` if `key` is present.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or corruption.
    pub fn contains_key(&self, key: &K) -> CoreResult<bool> {
        Ok(self.find_entry(key)?.is_some())
    }

    /// Inserts or updates `key`, returning the previous value if any.
    ///
    /// An update whose payload fits the existing record is rewritten in
    /// place; a larger payload gets a fresh allocation and the old
    /// region is abandoned.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corruption, or codec failure.
    pub fn put(&self, key: &K, value: Value) -> CoreResult<Option<Value>> {
        let payload = self.store.serializer(self.serializer_id)?.encode(&value)?;
        self.put_encoded(key, &payload, self.serializer_id)
    }

    /// Inserts or updates `key` with pre-encoded payload bytes.
    pub(crate) fn put_encoded(
        &self,
        key: &K,
        payload: &[u8],
        serializer_id: u32,
    ) -> CoreResult<Option<Value>> {
        let location = self.locate(key)?;

        if let Some(existing) = &location.target {
            let previous = self.load_value(existing)?;

            let record_position = if payload.len() as u32 <= existing.record_size {
                self.store.write(existing.record_position, payload)?;
                existing.record_position
            } else {
                let fresh = self.store.allocate(payload.len() as u64)?;
                self.store.write(fresh, payload)?;
                fresh
            };

            // Keep record metadata consistent across the whole tower.
            for level in &location.levels {
                if !level.matches {
                    continue;
                }
                let mut node = SkipEntryNode::read(&self.store, level.next)?;
                node.record_position = record_position;
                node.record_size = payload.len() as u32;
                node.serializer_id = serializer_id;
                self.store.write(node.position, &node.encode())?;
            }

            return Ok(Some(previous));
        }

        let key_bytes = key.encode();
        if key_bytes.len() > u16::MAX as usize {
            return Err(CoreError::invalid_key(format!(
                "key encoding is {} bytes, limit is {}",
                key_bytes.len(),
                u16::MAX
            )));
        }

        let record_position = self.store.allocate(payload.len() as u64)?;
        self.store.write(record_position, payload)?;

        // Write the tower bottom-up, fully linked, before splicing any
        // predecessor so readers never see a half-built node.
        let height = random_level();
        let node_size = SkipEntryNode::encoded_size_for(key_bytes.len()) as u64;
        let mut nodes: Vec<SkipEntryNode> = Vec::with_capacity(height as usize);
        let mut down = 0u64;
        for level in 0..height {
            let position = self.store.allocate(node_size)?;
            let node = SkipEntryNode {
                level,
                next: location.at_level(level).next,
                down,
                position,
                record_position,
                record_size: payload.len() as u32,
                serializer_id,
                key_bytes: key_bytes.clone(),
            };
            self.store.write(position, &node.encode())?;
            down = position;
            nodes.push(node);
        }

        for node in &nodes {
            self.set_pred_next(location.at_level(node.level), node.position)?;
        }

        self.header.increment()?;
        Ok(None)
    }

    /// Removes `key`, returning the previous value if it was present.
    ///
    /// Splices the entry's tower out of every level it appears at; the
    /// node and payload regions are abandoned, not reused.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corruption, or codec failure.
    pub fn remove(&self, key: &K) -> CoreResult<Option<Value>> {
        let location = self.locate(key)?;
        let Some(target) = &location.target else {
            return Ok(None);
        };
        let previous = self.load_value(target)?;

        for level in &location.levels {
            if !level.matches {
                continue;
            }
            let doomed = SkipEntryNode::read(&self.store, level.next)?;
            self.set_pred_next(level, doomed.next)?;
        }

        self.header.decrement()?;
        Ok(Some(previous))
    }

    /// Iterates every entry in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the head tower cannot be read.
    pub fn iter(&self) -> CoreResult<SkipListIter<K>> {
        let base = self.base_head()?;
        Ok(SkipListIter::new(Arc::clone(&self.store), base.next, None))
    }

    /// Scans entries with keys above `key` in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or corruption.
    pub fn above(&self, key: &K, inclusive: bool) -> CoreResult<SkipListIter<K>> {
        let location = self.locate(key)?;
        let level0 = location.at_level(0);
        let mut start = level0.next;
        if level0.matches && !inclusive {
            let matched = SkipEntryNode::read(&self.store, level0.next)?;
            start = matched.next;
        }
        Ok(SkipListIter::new(Arc::clone(&self.store), start, None))
    }

    /// Scans entries with keys below `key` in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or corruption.
    pub fn below(&self, key: &K, inclusive: bool) -> CoreResult<SkipListIter<K>> {
        let base = self.base_head()?;
        Ok(SkipListIter::new(
            Arc::clone(&self.store),
            base.next,
            Some((key.clone(), inclusive)),
        ))
    }

    /// Descends the head tower to the level-0 head.
    fn base_head(&self) -> CoreResult<SkipHeadNode> {
        let mut head = self.cache.get_head(&self.store, self.top_head())?;
        while head.down != 0 {
            head = self.cache.get_head(&self.store, head.down)?;
        }
        Ok(head)
    }

    /// Point search without path recording.
    fn find_entry(&self, key: &K) -> CoreResult<Option<SkipEntryNode>> {
        if self.header.record_count() == 0 {
            return Ok(None);
        }

        let mut current = Link::Head(self.cache.get_head(&self.store, self.top_head())?);
        loop {
            loop {
                let next_offset = current.next();
                if next_offset == 0 {
                    break;
                }
                let entry = SkipEntryNode::read(&self.store, next_offset)?;
                match K::decode(&entry.key_bytes)?.cmp(key) {
                    Ordering::Less => current = Link::Entry(entry),
                    Ordering::Equal => {
                        // Level 0 is authoritative for record fields.
                        let mut node = entry;
                        while node.down != 0 {
                            node = SkipEntryNode::read(&self.store, node.down)?;
                        }
                        return Ok(Some(node));
                    }
                    Ordering::Greater => break,
                }
            }

            let down = current.down();
            if down == 0 {
                return Ok(None);
            }
            current = self.descend(&current, down)?;
        }
    }

    /// Full search: predecessor and successor at every level, plus the
    /// level-0 match.
    fn locate(&self, key: &K) -> CoreResult<Location> {
        let mut current = Link::Head(self.cache.get_head(&self.store, self.top_head())?);
        let mut levels = Vec::with_capacity(MAX_LEVEL as usize);
        let mut target = None;

        loop {
            let mut matched = false;
            let mut next_offset;
            loop {
                next_offset = current.next();
                if next_offset == 0 {
                    break;
                }
                let entry = SkipEntryNode::read(&self.store, next_offset)?;
                match K::decode(&entry.key_bytes)?.cmp(key) {
                    Ordering::Less => current = Link::Entry(entry),
                    Ordering::Equal => {
                        matched = true;
                        if current.down() == 0 {
                            target = Some(entry);
                        }
                        break;
                    }
                    Ordering::Greater => break,
                }
            }

            levels.push(PathLevel {
                pred_position: current.position(),
                pred_is_head: current.is_head(),
                next: next_offset,
                matches: matched,
            });

            let down = current.down();
            if down == 0 {
                break;
            }
            current = self.descend(&current, down)?;
        }

        Ok(Location { levels, target })
    }

    /// Follows a `down` pointer, preserving head-ness.
    fn descend(&self, from: &Link, down: u64) -> CoreResult<Link> {
        Ok(if from.is_head() {
            Link::Head(self.cache.get_head(&self.store, down)?)
        } else {
            Link::Entry(SkipEntryNode::read(&self.store, down)?)
        })
    }

    /// Rewrites a path predecessor's `next` pointer, through the cache
    /// for heads.
    fn set_pred_next(&self, level: &PathLevel, next: u64) -> CoreResult<()> {
        if level.pred_is_head {
            let mut head = self.cache.get_head(&self.store, level.pred_position)?;
            head.next = next;
            self.cache.put_head(&self.store, &head)
        } else {
            let mut pred = SkipEntryNode::read(&self.store, level.pred_position)?;
            pred.next = next;
            self.store.write(pred.position, &pred.encode())
        }
    }

    fn load_value(&self, entry: &SkipEntryNode) -> CoreResult<Value> {
        let payload = self
            .store
            .read(entry.record_position, entry.record_size as usize)?;
        let codec = self.store.serializer(entry.serializer_id)?;
        Ok(codec.decode(&payload)?)
    }
}

impl<K: MapKey> PersistentMap<K> for SkipList<K> {
    fn get(&self, key: &K) -> CoreResult<Option<Value>> {
        SkipList::get(self, key)
    }

    fn put(&self, key: &K, value: Value) -> CoreResult<Option<Value>> {
        SkipList::put(self, key, value)
    }

    fn remove(&self, key: &K) -> CoreResult<Option<Value>> {
        SkipList::remove(self, key)
    }

    fn contains_key(&self, key: &K) -> CoreResult<bool> {
        SkipList::contains_key(self, key)
    }

    fn len(&self) -> u64 {
        self.header.record_count()
    }

    fn clear(&self) -> CoreResult<()> {
        self.cache.clear();

        let mut down = 0u64;
        for level in 0..MAX_LEVEL {
            let position = self.store.allocate(SkipHeadNode::SIZE as u64)?;
            let node = SkipHeadNode {
                level,
                next: 0,
                down,
                position,
            };
            self.cache.put_head(&self.store, &node)?;
            down = position;
        }

        self.header.set_first_node(down)?;
        self.header.reset_count()?;
        self.top_head.store(down, AtomicOrdering::Release);
        Ok(())
    }
}

impl<K: MapKey> std::fmt::Debug for SkipList<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipList")
            .field("top_head", &self.top_head())
            .field("records", &self.header.record_count())
            .finish_non_exhaustive()
    }
}

/// Picks a tower height: repeated coin flips capped at [`MAX_LEVEL`].
fn random_level() -> u8 {
    let mut rng = rand::thread_rng();
    let mut level = 1u8;
    while level < MAX_LEVEL && rng.gen_bool(0.5) {
        level += 1;
    }
    level
}

/// Lazy forward iterator over a level-0 chain.
///
/// Yields [`EntryRef`]s in ascending key order. Forward-only and not
/// restartable; create a fresh iterator to scan again. Dropping it is
/// the cancellation point for long scans.
pub struct SkipListIter<K: MapKey> {
    store: Arc<Store>,
    next_offset: u64,
    upper: Option<(K, bool)>,
    finished: bool,
}

impl<K: MapKey> SkipListIter<K> {
    pub(crate) fn new(store: Arc<Store>, start: u64, upper: Option<(K, bool)>) -> Self {
        Self {
            store,
            next_offset: start,
            upper,
            finished: false,
        }
    }

    /// Builds an iterator from a bucket's topmost head offset.
    pub(crate) fn from_head(
        store: Arc<Store>,
        cache: &NodeCache,
        top_head: u64,
    ) -> CoreResult<Self> {
        let mut head = cache.get_head(&store, top_head)?;
        while head.down != 0 {
            head = cache.get_head(&store, head.down)?;
        }
        Ok(Self::new(store, head.next, None))
    }
}

impl<K: MapKey> Iterator for SkipListIter<K> {
    type Item = CoreResult<EntryRef<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next_offset == 0 {
            self.finished = true;
            return None;
        }

        let node = match SkipEntryNode::read(&self.store, self.next_offset) {
            Ok(node) => node,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };
        let key = match K::decode(&node.key_bytes) {
            Ok(key) => key,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        if let Some((bound, inclusive)) = &self.upper {
            let beyond = match key.cmp(bound) {
                Ordering::Less => false,
                Ordering::Equal => !*inclusive,
                Ordering::Greater => true,
            };
            if beyond {
                self.finished = true;
                return None;
            }
        }

        self.next_offset = node.next;
        Some(Ok(EntryRef {
            key,
            node_position: node.position,
            record_position: node.record_position,
            record_size: node.record_size,
            serializer_id: node.serializer_id,
        }))
    }
}
