//! # MatrixDB Core
//!
//! The persistent map engine of MatrixDB.
//!
//! Entity tables, secondary indexes, and relationship edge lists are
//! all ultimately one abstraction: a persistent, ordered, concurrently
//! accessible key-value map stored as raw byte offsets inside a
//! growable volume. This crate is that engine:
//!
//! - [`Store`] - byte volume with monotonic allocation and the
//!   serializer registry
//! - [`SkipList`] - disk-resident ordered skip list
//! - [`HashMatrixMap`] - the skip list sharded under a fixed fan-out
//!   radix trie over decimal hash digits
//! - [`NodeCache`] - bounded write-through node cache
//! - [`LevelLocks`] / [`DispatchLock`] - striped and identity-keyed
//!   locking primitives
//! - lazy iteration views ([`MapIter`], [`Keys`], [`Values`],
//!   [`Entries`], [`Dicts`])
//!
//! Query evaluation, cascades, transactions, and network surfaces live
//! in other crates and consume this engine through the
//! [`PersistentMap`] contract.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod iter;
mod key;
mod lock;
mod matrix;
mod node;
mod skiplist;
mod store;
mod traits;

pub use cache::NodeCache;
pub use config::{MapConfig, MAX_LOAD_FACTOR, MIN_LOAD_FACTOR};
pub use error::{CoreError, CoreResult};
pub use iter::{Dicts, Entries, Keys, MapIter, Values};
pub use key::{hash_key, MapKey};
pub use lock::{DispatchLock, LevelLocks, LevelReadGuard, LevelWriteGuard, LockMode, LEVEL_COUNT};
pub use matrix::HashMatrixMap;
pub use node::{HeaderHandle, MapHeader, MatrixNode, SkipEntryNode, SkipHeadNode, MATRIX_FANOUT};
pub use skiplist::{EntryRef, SkipList, SkipListIter, MAX_LEVEL};
pub use store::{
    Store, SERIALIZER_BINARY, SERIALIZER_CBOR, SERIALIZER_RAW, STORE_MAGIC, STORE_VERSION,
};
pub use traits::PersistentMap;

// Re-exported so callers rarely need a direct matrixdb_codec dependency.
pub use matrixdb_codec::{CodecError, PayloadCodec, Value};
