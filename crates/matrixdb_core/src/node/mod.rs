//! Persisted node formats.
//!
//! Every structure a map writes into its store lives here: the map
//! header, the skip-list head and entry nodes, and the matrix (trie)
//! node. All formats are fixed little-endian layouts; only the entry
//! node varies in size, with the key persisted inline.

mod header;
mod matrix;
mod skip;

pub use header::{HeaderHandle, MapHeader};
pub use matrix::{MatrixNode, MATRIX_FANOUT};
pub use skip::{SkipEntryNode, SkipHeadNode};
