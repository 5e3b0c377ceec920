//! # MatrixDB Storage
//!
//! Byte volume abstraction for MatrixDB.
//!
//! A [`Volume`] is a growable, randomly-addressable byte store. Volumes
//! know nothing about node formats, headers, or skip lists - all layout
//! interpretation happens in `matrixdb_core`. This crate provides:
//!
//! - [`Volume`] - the backend trait (positional reads and writes)
//! - [`FileVolume`] - persistent, file-backed storage
//! - [`InMemoryVolume`] - ephemeral storage for tests and scratch maps

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod volume;

pub use error::{StorageError, StorageResult};
pub use file::FileVolume;
pub use memory::InMemoryVolume;
pub use volume::Volume;
