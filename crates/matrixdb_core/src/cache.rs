//! Write-through node cache.

use crate::error::CoreResult;
use crate::node::{MatrixNode, SkipHeadNode};
use crate::store::Store;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// A cached node image.
#[derive(Debug, Clone)]
enum CachedNode {
    Matrix(MatrixNode),
    Head(SkipHeadNode),
}

/// A bounded, write-through cache of matrix nodes and skip-list heads.
///
/// The cache removes redundant store reads on hot descent paths. It is
/// an accelerator only - the store stays authoritative:
///
/// - writes always hit the store first, then the cache (write-through)
/// - a hit whose node fails its identity check (or has the wrong node
///   kind for the request) is evicted and the store re-read
/// - entries are evicted LRU under capacity pressure, so callers must
///   never assume residency
#[derive(Debug)]
pub struct NodeCache {
    inner: Mutex<LruCache<u64, CachedNode>>,
}

impl NodeCache {
    /// Creates a cache holding at most `capacity` nodes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Fetches the matrix node at `offset`, from cache or store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails or the node fails its
    /// position self-check.
    pub fn get_matrix(&self, store: &Store, offset: u64) -> CoreResult<MatrixNode> {
        {
            let mut cache = self.inner.lock();
            match cache.get(&offset) {
                Some(CachedNode::Matrix(node)) if node.position == offset => {
                    return Ok(*node);
                }
                Some(_) => {
                    // Wrong kind or stale identity: the store decides.
                    cache.pop(&offset);
                }
                None => {}
            }
        }

        let node = MatrixNode::read(store, offset)?;
        self.inner.lock().put(offset, CachedNode::Matrix(node));
        Ok(node)
    }

    /// Writes a matrix node through to the store and caches it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn put_matrix(&self, store: &Store, node: &MatrixNode) -> CoreResult<()> {
        store.write(node.position, &node.encode())?;
        self.inner
            .lock()
            .put(node.position, CachedNode::Matrix(*node));
        Ok(())
    }

    /// Fetches the skip-list head at `offset`, from cache or store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn get_head(&self, store: &Store, offset: u64) -> CoreResult<SkipHeadNode> {
        {
            let mut cache = self.inner.lock();
            match cache.get(&offset) {
                Some(CachedNode::Head(node)) if node.position == offset => {
                    return Ok(*node);
                }
                Some(_) => {
                    cache.pop(&offset);
                }
                None => {}
            }
        }

        let node = SkipHeadNode::read(store, offset)?;
        self.inner.lock().put(offset, CachedNode::Head(node));
        Ok(node)
    }

    /// Writes a skip-list head through to the store and caches it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn put_head(&self, store: &Store, node: &SkipHeadNode) -> CoreResult<()> {
        store.write(node.position, &node.encode())?;
        self.inner.lock().put(node.position, CachedNode::Head(*node));
        Ok(())
    }

    /// Evicts every cached node.
    ///
    /// Used when a map's structure is rebuilt out from under it.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Returns the number of cached nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
