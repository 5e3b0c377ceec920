//! Striped level locks and the identity-keyed dispatch lock.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::Arc;

/// Number of lock stripes, one per possible leading hash digit.
pub const LEVEL_COUNT: usize = 10;

/// Locking mode for a map.
///
/// `Disabled` is for single-threaded or externally-synchronized
/// embedded use: every acquisition is a no-op and the caller guarantees
/// exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Real striped locking (the default).
    #[default]
    Striped,
    /// No-op locking; the caller synchronizes externally.
    Disabled,
}

/// A read/write lock striped by hash level (0-9).
///
/// Contention on one level never blocks another, so operations on
/// distinct buckets proceed in parallel. Acquisition blocks the calling
/// thread until the stripe is free.
pub struct LevelLocks {
    mode: LockMode,
    stripes: [RwLock<()>; LEVEL_COUNT],
}

/// RAII guard for a shared (read) stripe acquisition.
#[must_use = "the stripe is released when the guard drops"]
pub struct LevelReadGuard<'a> {
    _inner: Option<RwLockReadGuard<'a, ()>>,
}

/// RAII guard for an exclusive (write) stripe acquisition.
#[must_use = "the stripe is released when the guard drops"]
pub struct LevelWriteGuard<'a> {
    _inner: Option<RwLockWriteGuard<'a, ()>>,
}

impl LevelLocks {
    /// Creates a new set of level locks.
    #[must_use]
    pub fn new(mode: LockMode) -> Self {
        Self {
            mode,
            stripes: std::array::from_fn(|_| RwLock::new(())),
        }
    }

    /// Returns the configured locking mode.
    #[must_use]
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Acquires the stripe for `level` shared, blocking until free.
    ///
    /// # Panics
    ///
    /// Debug-panics if `level` is not in `0..10`.
    pub fn read(&self, level: u8) -> LevelReadGuard<'_> {
        debug_assert!((level as usize) < LEVEL_COUNT, "level {level} out of range");
        LevelReadGuard {
            _inner: match self.mode {
                LockMode::Striped => Some(self.stripes[level as usize].read()),
                LockMode::Disabled => None,
            },
        }
    }

    /// Acquires the stripe for `level` exclusively, blocking until free.
    ///
    /// # Panics
    ///
    /// Debug-panics if `level` is not in `0..10`.
    pub fn write(&self, level: u8) -> LevelWriteGuard<'_> {
        debug_assert!((level as usize) < LEVEL_COUNT, "level {level} out of range");
        LevelWriteGuard {
            _inner: match self.mode {
                LockMode::Striped => Some(self.stripes[level as usize].write()),
                LockMode::Disabled => None,
            },
        }
    }

    /// Acquires every stripe exclusively, in ascending order.
    ///
    /// Used by whole-map operations such as `clear`. The fixed order
    /// keeps concurrent callers deadlock-free.
    pub fn write_all(&self) -> Vec<LevelWriteGuard<'_>> {
        (0..LEVEL_COUNT as u8).map(|lvl| self.write(lvl)).collect()
    }
}

impl std::fmt::Debug for LevelLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelLocks").field("mode", &self.mode).finish()
    }
}

/// A mutex scoped to the identity of an object.
///
/// `with_lock` serializes closures that present the same token, which
/// callers use for atomic read-modify-write sequences (compute-if-absent
/// and friends) over one logical map. Tokens come from
/// [`DispatchLock::token_of`], so the lock is keyed by *which* object is
/// involved, never by its value.
pub struct DispatchLock {
    mode: LockMode,
    slots: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl DispatchLock {
    /// Creates a new dispatch lock.
    #[must_use]
    pub fn new(mode: LockMode) -> Self {
        Self {
            mode,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Derives the identity token of an object reference.
    #[must_use]
    pub fn token_of<T: ?Sized>(value: &T) -> u64 {
        value as *const T as *const () as usize as u64
    }

    /// Runs `f` while holding the mutex for `token`.
    ///
    /// Two calls with the same token are mutually exclusive; calls with
    /// different tokens proceed in parallel. Slots are dropped when the
    /// last holder leaves, so the table stays bounded by live tokens.
    pub fn with_lock<R>(&self, token: u64, f: impl FnOnce() -> R) -> R {
        if self.mode == LockMode::Disabled {
            return f();
        }

        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(token).or_insert_with(|| Arc::new(Mutex::new(()))))
        };

        let result = {
            let _guard = slot.lock();
            f()
        };

        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(&token) {
            // Table holds one reference, `slot` holds the other.
            if Arc::strong_count(existing) == 2 {
                slots.remove(&token);
            }
        }

        result
    }
}

impl std::fmt::Debug for DispatchLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchLock")
            .field("mode", &self.mode)
            .field("slots", &self.slots.lock().len())
            .finish()
    }
}
