//! Store: byte volume plus allocation cursor and serializer registry.

use crate::error::{CoreError, CoreResult};
use matrixdb_codec::{BinaryCodec, CborCodec, PayloadCodec, RawCodec};
use matrixdb_storage::{InMemoryVolume, StorageError, Volume};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Magic bytes stamped at offset 0 of every store.
pub const STORE_MAGIC: [u8; 4] = *b"MXST";

/// Current store format version.
pub const STORE_VERSION: u16 = 1;

/// Serializer id of [`RawCodec`].
pub const SERIALIZER_RAW: u32 = 0;
/// Serializer id of [`BinaryCodec`].
pub const SERIALIZER_BINARY: u32 = 1;
/// Serializer id of [`CborCodec`].
pub const SERIALIZER_CBOR: u32 = 2;

/// Size of the store preamble: magic (4) + version (2) + flags (2).
///
/// The preamble occupies offset 0, which doubles as the "no node"
/// sentinel - no allocation can ever be issued there.
const PREAMBLE_SIZE: u64 = 8;

/// Allocation alignment in bytes.
const ALIGN: u64 = 8;

/// A store: one growable byte volume, an allocation cursor, and the
/// registry of payload codecs.
///
/// The store is the single source of truth for every map anchored in
/// it. Allocation is monotonic - `allocate` never re-issues a range,
/// and regions abandoned by value growth stay abandoned until an
/// explicit map rebuild writes into a fresh store.
///
/// # Example
///
/// ```
/// use matrixdb_core::Store;
///
/// let store = Store::in_memory().unwrap();
/// let offset = store.allocate(32).unwrap();
/// store.write(offset, b"node image").unwrap();
/// assert_eq!(store.read(offset, 10).unwrap(), b"node image");
/// ```
pub struct Store {
    volume: Box<dyn Volume>,
    cursor: Mutex<u64>,
    serializers: RwLock<HashMap<u32, Arc<dyn PayloadCodec>>>,
}

impl Store {
    /// Opens a store over the given volume.
    ///
    /// An empty volume is stamped with the store preamble; a non-empty
    /// one has its preamble validated. The allocation cursor resumes at
    /// the current end of the volume.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the volume starts with
    /// foreign bytes or an unsupported format version, or a storage
    /// error on I/O failure.
    pub fn open(volume: Box<dyn Volume>) -> CoreResult<Self> {
        let len = volume.len()?;

        if len == 0 {
            let mut preamble = Vec::with_capacity(PREAMBLE_SIZE as usize);
            preamble.extend_from_slice(&STORE_MAGIC);
            preamble.extend_from_slice(&STORE_VERSION.to_le_bytes());
            preamble.extend_from_slice(&0u16.to_le_bytes());
            volume.write_at(0, &preamble)?;
            tracing::debug!(version = STORE_VERSION, "created new store");
        } else {
            if len < PREAMBLE_SIZE {
                return Err(CoreError::corrupt_store("volume shorter than preamble"));
            }
            let preamble = volume.read_at(0, PREAMBLE_SIZE as usize)?;
            if preamble[0..4] != STORE_MAGIC {
                return Err(CoreError::invalid_config(
                    "volume is not a MatrixDB store (bad magic)",
                ));
            }
            let version = u16::from_le_bytes([preamble[4], preamble[5]]);
            if version > STORE_VERSION {
                return Err(CoreError::invalid_config(format!(
                    "unsupported store format version {version}"
                )));
            }
            tracing::debug!(version, size = len, "opened existing store");
        }

        let cursor = align_up(len.max(PREAMBLE_SIZE));

        let store = Self {
            volume,
            cursor: Mutex::new(cursor),
            serializers: RwLock::new(HashMap::new()),
        };
        store.register_builtin_serializers();
        Ok(store)
    }

    /// Opens a store over a fresh in-memory volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the preamble cannot be written.
    pub fn in_memory() -> CoreResult<Self> {
        Self::open(Box::new(InMemoryVolume::new()))
    }

    fn register_builtin_serializers(&self) {
        let mut serializers = self.serializers.write();
        serializers.insert(SERIALIZER_RAW, Arc::new(RawCodec) as Arc<dyn PayloadCodec>);
        serializers.insert(SERIALIZER_BINARY, Arc::new(BinaryCodec));
        serializers.insert(SERIALIZER_CBOR, Arc::new(CborCodec));
    }

    /// Allocates `len` bytes of previously-unused, zeroed space.
    ///
    /// The returned offset is 8-byte aligned and the region is
    /// zero-filled, so a crash between allocation and the node write
    /// leaves bytes that decode as "absent" rather than stale data.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the volume cannot be extended.
    pub fn allocate(&self, len: u64) -> CoreResult<u64> {
        // A zero-length record still gets a distinct region.
        let aligned = align_up(len.max(1));
        let mut cursor = self.cursor.lock();
        let offset = *cursor;
        self.volume.write_at(offset, &vec![0u8; aligned as usize])?;
        *cursor = offset + aligned;
        Ok(offset)
    }

    /// Reads `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// A read past the end of the volume means a dangling node offset
    /// and is reported as [`CoreError::CorruptStore`]; other I/O
    /// failures propagate as storage errors.
    pub fn read(&self, offset: u64, len: usize) -> CoreResult<Vec<u8>> {
        match self.volume.read_at(offset, len) {
            Ok(bytes) => Ok(bytes),
            Err(StorageError::ReadPastEnd {
                offset: o,
                len: l,
                size,
            }) => Err(CoreError::corrupt_store(format!(
                "node offset {o:#x} (+{l}) points past end of store ({size} bytes)"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `data` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns a storage error on I/O failure.
    pub fn write(&self, offset: u64, data: &[u8]) -> CoreResult<()> {
        self.volume.write_at(offset, data)?;
        Ok(())
    }

    /// Registers a payload codec under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the id is already taken -
    /// records reference codecs by id, so rebinding one would silently
    /// misread existing payloads.
    pub fn register_serializer(&self, id: u32, codec: Arc<dyn PayloadCodec>) -> CoreResult<()> {
        let mut serializers = self.serializers.write();
        if serializers.contains_key(&id) {
            return Err(CoreError::invalid_config(format!(
                "serializer id {id} is already registered"
            )));
        }
        serializers.insert(id, codec);
        Ok(())
    }

    /// Resolves the payload codec registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if no codec is registered
    /// under the id.
    pub fn serializer(&self, id: u32) -> CoreResult<Arc<dyn PayloadCodec>> {
        self.serializers
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::invalid_config(format!("unknown serializer id {id}")))
    }

    /// Returns the current size of the store in bytes.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the size cannot be determined.
    pub fn len(&self) -> CoreResult<u64> {
        Ok(self.volume.len()?)
    }

    /// Returns `true` if the store holds nothing beyond its preamble.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the size cannot be determined.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? <= PREAMBLE_SIZE)
    }

    /// Flushes pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns a storage error on failure.
    pub fn flush(&self) -> CoreResult<()> {
        self.volume.flush()?;
        Ok(())
    }

    /// Syncs the store durably to disk.
    ///
    /// # Errors
    ///
    /// Returns a storage error on failure.
    pub fn sync(&self) -> CoreResult<()> {
        self.volume.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("cursor", &*self.cursor.lock())
            .field("serializers", &self.serializers.read().len())
            .finish_non_exhaustive()
    }
}

const fn align_up(value: u64) -> u64 {
    (value + ALIGN - 1) & !(ALIGN - 1)
}
