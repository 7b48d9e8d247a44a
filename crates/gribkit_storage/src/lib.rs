//! # gribkit Storage
//!
//! Byte-store backends underneath gribkit containers.
//!
//! A container file and every sink a message is written to are **opaque
//! byte stores**: they know how to read a range, append and flush, and
//! nothing about frames or records. The codec owns all format
//! interpretation.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and in-memory containers
//! - [`FileBackend`] - For container files on disk, read-only or read/write
//!
//! ## Example
//!
//! ```rust
//! use gribkit_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"GRIB").unwrap();
//! let data = backend.read_at(offset, 4).unwrap();
//! assert_eq!(&data, b"GRIB");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
