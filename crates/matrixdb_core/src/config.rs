//! Map configuration.

use crate::error::{CoreError, CoreResult};
use crate::lock::LockMode;
use crate::store::SERIALIZER_BINARY;

/// Smallest allowed trie depth.
pub const MIN_LOAD_FACTOR: u8 = 1;
/// Largest allowed trie depth.
pub const MAX_LOAD_FACTOR: u8 = 10;

/// Configuration for opening a hash-matrix map.
///
/// `load_factor` is the trie depth: how many decimal hash digits are
/// consumed before a key falls into a bucket skip list. It trades
/// up-front matrix allocation against bucket chain length, is fixed at
/// map creation, and **must not change across reopens of the same
/// header** - a different depth would route existing keys down the
/// wrong paths. Changing it requires an explicit
/// [`crate::HashMatrixMap::rebuild`].
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Trie depth in hash digits (1-10).
    pub load_factor: u8,

    /// Maximum number of nodes retained by the node cache.
    pub cache_capacity: usize,

    /// Locking mode for level and dispatch locks.
    pub lock_mode: LockMode,

    /// Serializer id used to encode values written through this map.
    /// Reads resolve each record's own stored id, so maps can hold
    /// payloads from several serializers at once.
    pub serializer_id: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            load_factor: 3,
            cache_capacity: 1024,
            lock_mode: LockMode::Striped,
            serializer_id: SERIALIZER_BINARY,
        }
    }
}

impl MapConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the trie depth.
    #[must_use]
    pub const fn load_factor(mut self, value: u8) -> Self {
        self.load_factor = value;
        self
    }

    /// Sets the node cache capacity.
    #[must_use]
    pub const fn cache_capacity(mut self, value: usize) -> Self {
        self.cache_capacity = value;
        self
    }

    /// Sets the locking mode.
    #[must_use]
    pub const fn lock_mode(mut self, value: LockMode) -> Self {
        self.lock_mode = value;
        self
    }

    /// Sets the serializer id for writes.
    #[must_use]
    pub const fn serializer_id(mut self, value: u32) -> Self {
        self.serializer_id = value;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if `load_factor` is outside
    /// `1..=10`.
    pub fn validate(&self) -> CoreResult<()> {
        if self.load_factor < MIN_LOAD_FACTOR || self.load_factor > MAX_LOAD_FACTOR {
            return Err(CoreError::invalid_config(format!(
                "load factor must be between {MIN_LOAD_FACTOR} and {MAX_LOAD_FACTOR}, got {}",
                self.load_factor
            )));
        }
        Ok(())
    }
}
