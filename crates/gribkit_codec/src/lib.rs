//! # gribkit Codec
//!
//! The record and index codec that gribkit handles are keyed into.
//!
//! This crate provides:
//! - [`Record`] and [`Value`]: a record's ordered key/value schema with
//!   missing flags and the scalar/array values stored under its keys
//! - wire framing of records inside container files ([`encode_frame`],
//!   [`read_frame`], [`scan_frames`])
//! - [`IndexTable`]: key values of every record across containers, and
//!   its index file format
//! - [`RecordCodec`] / [`IndexCodec`]: the opaque handle-keyed interface
//!   the lifecycle layer programs against
//! - [`NativeCodec`]: the in-tree implementation of both traits
//!
//! ## Usage
//!
//! ```
//! use gribkit_codec::{encode_frame, decode_frame, Record, Value};
//!
//! let record = Record::builder()
//!     .field_in("shortName", &["ls"], "msl")
//!     .field("values", vec![101_325.0, 101_310.0])
//!     .build();
//! let frame = encode_frame(&record).unwrap();
//! assert_eq!(&frame[..4], b"GRIB");
//!
//! let decoded = decode_frame(&frame).unwrap();
//! assert_eq!(decoded.get("shortName").unwrap(), Some(&Value::from("msl")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod error;
mod frame;
mod index;
mod native;
mod record;
pub mod samples;
mod value;

pub use api::{Codec, IndexCodec, IndexHandle, KeyIterHandle, RecordCodec, RecordHandle};
pub use error::{CodecError, CodecResult};
pub use frame::{
    decode_frame, encode_frame, locate_frame, read_frame, scan_frames, FrameLocation,
    FRAME_MAGIC, FRAME_OVERHEAD, FRAME_TRAILER,
};
pub use index::{IndexEntry, IndexTable, MISSING_TEXT, UNDEF_TEXT};
pub use native::{NativeCodec, DEFAULT_MAX_MESSAGE_SIZE};
pub use record::{Field, Record, RecordBuilder, VALUES_KEY};
pub use value::{NativeType, Value};
