//! Handle-keyed codec interface.
//!
//! The lifecycle layer never touches records or index tables directly; it
//! holds opaque handles and calls these traits. Any implementation works
//! as long as it honours the handle contract:
//!
//! - every `new_*`/`clone_*` call issues a fresh handle
//! - a released handle is invalid forever ([`CodecError::InvalidHandle`])
//! - `get_scalar` reports [`CodecError::ArrayTooSmall`] whenever the key
//!   holds an array, even a one-element one
//!
//! [`CodecError::InvalidHandle`]: crate::CodecError::InvalidHandle
//! [`CodecError::ArrayTooSmall`]: crate::CodecError::ArrayTooSmall

use crate::error::CodecResult;
use crate::value::{NativeType, Value};
use bytes::Bytes;
use gribkit_storage::StorageBackend;
use std::fmt;
use std::path::Path;

macro_rules! handle_type {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw handle id.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw handle id.
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

handle_type!(
    /// Opaque handle to one decoded record.
    RecordHandle,
    "record"
);
handle_type!(
    /// Opaque handle to an index.
    IndexHandle,
    "index"
);
handle_type!(
    /// Opaque handle to a key-name cursor.
    KeyIterHandle,
    "key-iterator"
);

/// Record-level codec operations.
pub trait RecordCodec: Send + Sync {
    /// Counts the records in a container store.
    fn count_in_file(&self, file: &dyn StorageBackend) -> CodecResult<usize>;

    /// Decodes the record at `offset` into a new handle.
    ///
    /// Returns the handle and the offset of the following record, or
    /// `Ok(None)` at the end of the store.
    fn new_handle_from_file(
        &self,
        file: &dyn StorageBackend,
        offset: u64,
    ) -> CodecResult<Option<(RecordHandle, u64)>>;

    /// Instantiates a record from a named template.
    fn new_handle_from_sample(&self, name: &str) -> CodecResult<RecordHandle>;

    /// Deep-copies a record into a new handle.
    fn clone_handle(&self, handle: RecordHandle) -> CodecResult<RecordHandle>;

    /// Releases a record handle.
    fn release_handle(&self, handle: RecordHandle) -> CodecResult<()>;

    /// Reads a key as a scalar.
    fn get_scalar(
        &self,
        handle: RecordHandle,
        key: &str,
        ty: Option<NativeType>,
    ) -> CodecResult<Value>;

    /// Reads a key as an array.
    fn get_array(
        &self,
        handle: RecordHandle,
        key: &str,
        ty: Option<NativeType>,
    ) -> CodecResult<Value>;

    /// Writes a scalar value.
    fn set_scalar(&self, handle: RecordHandle, key: &str, value: &Value) -> CodecResult<()>;

    /// Writes an array value.
    fn set_array(&self, handle: RecordHandle, key: &str, value: &Value) -> CodecResult<()>;

    /// Reports whether a key is marked missing.
    fn is_missing(&self, handle: RecordHandle, key: &str) -> CodecResult<bool>;

    /// Marks a key missing.
    fn set_missing(&self, handle: RecordHandle, key: &str) -> CodecResult<()>;

    /// The full binary encoding of the record.
    fn message_bytes(&self, handle: RecordHandle) -> CodecResult<Bytes>;

    /// Byte length of the record's binary encoding.
    fn message_byte_size(&self, handle: RecordHandle) -> CodecResult<usize> {
        self.message_bytes(handle).map(|b| b.len())
    }

    /// Appends the record's binary encoding to a sink.
    ///
    /// Returns the offset the record was written at.
    fn serialize_to_sink(
        &self,
        handle: RecordHandle,
        sink: &mut dyn StorageBackend,
    ) -> CodecResult<u64> {
        let bytes = self.message_bytes(handle)?;
        let offset = sink.append(&bytes)?;
        sink.flush()?;
        Ok(offset)
    }

    /// Opens a cursor over the record's key names.
    fn new_key_iterator(
        &self,
        handle: RecordHandle,
        namespace: Option<&str>,
    ) -> CodecResult<KeyIterHandle>;

    /// Moves the cursor to the next key; false once exhausted.
    fn advance(&self, iter: KeyIterHandle) -> CodecResult<bool>;

    /// Name of the key under the cursor.
    fn current_name(&self, iter: KeyIterHandle) -> CodecResult<String>;

    /// Disposes of a key cursor.
    fn dispose_iterator(&self, iter: KeyIterHandle) -> CodecResult<()>;
}

/// Index-level codec operations.
pub trait IndexCodec: Send + Sync {
    /// Builds an index over `keys` from the records in `path`.
    fn new_index_from_file(&self, path: &Path, keys: &[String]) -> CodecResult<IndexHandle>;

    /// Loads an index previously written with [`IndexCodec::index_write`].
    fn read_index(&self, path: &Path) -> CodecResult<IndexHandle>;

    /// Duplicates an index, selection included.
    fn clone_index(&self, index: IndexHandle) -> CodecResult<IndexHandle>;

    /// Adds the records of another file under the same keys.
    fn index_add_file(&self, index: IndexHandle, path: &Path) -> CodecResult<()>;

    /// The keys the index was built over.
    fn index_keys(&self, index: IndexHandle) -> CodecResult<Vec<String>>;

    /// Number of distinct values seen for `key`.
    fn index_distinct_count(&self, index: IndexHandle, key: &str) -> CodecResult<usize>;

    /// Distinct values seen for `key`, converted to `ty`.
    ///
    /// The `MISSING` and `undef` markers are returned as text whatever
    /// `ty` is.
    fn index_distinct_values(
        &self,
        index: IndexHandle,
        key: &str,
        ty: NativeType,
    ) -> CodecResult<Vec<Value>>;

    /// Serializes the index to `path`.
    fn index_write(&self, index: IndexHandle, path: &Path) -> CodecResult<()>;

    /// Selects one value for one key, resetting the match cursor.
    fn index_select(&self, index: IndexHandle, key: &str, value: &Value) -> CodecResult<()>;

    /// Decodes the next record matching the selection, `Ok(None)` when no
    /// further record matches.
    fn new_handle_from_index(&self, index: IndexHandle) -> CodecResult<Option<RecordHandle>>;

    /// Releases an index handle.
    fn release_index(&self, index: IndexHandle) -> CodecResult<()>;
}

/// A complete codec: both record and index operations.
pub trait Codec: RecordCodec + IndexCodec {}

impl<T: RecordCodec + IndexCodec> Codec for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_display_their_kind() {
        assert_eq!(RecordHandle::new(3).to_string(), "record#3");
        assert_eq!(IndexHandle::new(1).to_string(), "index#1");
        assert_eq!(KeyIterHandle::new(9).as_u64(), 9);
    }
}
