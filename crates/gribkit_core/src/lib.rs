//! # gribkit Core
//!
//! Scoped handles over GRIB-style containers, messages and indexes.
//!
//! This crate provides:
//! - [`Context`]: binds a codec to a [`Config`] and opens everything else
//! - [`Container`]: iterates the messages of a file, in order
//! - [`Message`]: reads and writes keys of one decoded record
//! - [`Index`]: selects messages by the values of indexed keys
//!
//! A container or index owns every message it produces. Closing it, or
//! dropping it, closes those messages too; any later call on them fails
//! with [`GribError::UseAfterClose`].
//!
//! ## Quick Start
//!
//! ```rust
//! use gribkit_core::{Message, NativeType};
//!
//! let mut message = Message::from_sample("GRIB2")?;
//! message.set("shortName", "msl")?;
//! message.set("values", vec![1.0, 2.0, 3.0, 4.0])?;
//!
//! assert_eq!(message.get_string("shortName")?, "msl");
//! assert_eq!(message.get("values", None)?.len(), 4);
//! assert!(message.missing("scaleFactorOfSecondFixedSurface")?);
//! assert_eq!(message.get("level", Some(NativeType::Double))?.as_double(), Some(0.0));
//! # Ok::<(), gribkit_core::GribError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod container;
mod context;
mod error;
mod index;
mod message;
mod registry;

pub use config::Config;
pub use container::Container;
pub use context::Context;
pub use error::{GribError, GribResult, HandleKind};
pub use index::Index;
pub use message::Message;
pub use registry::{MessageId, OwnerKind};

pub use gribkit_codec::{Codec, NativeCodec, NativeType, Value};
pub use gribkit_storage::{FileBackend, InMemoryBackend, StorageBackend};
