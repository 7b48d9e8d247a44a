//! Error types for the codec crate.

use gribkit_storage::StorageError;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors reported by the record and index codecs.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The underlying byte store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A scalar read hit a key holding an array.
    ///
    /// Callers that want the whole array retry with an array read.
    #[error("passed array is too small: key {key} holds {len} elements")]
    ArrayTooSmall {
        /// The key that was read.
        key: String,
        /// Number of elements stored under the key.
        len: usize,
    },

    /// The key is not present in the record.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The requested key.
        key: String,
    },

    /// The key is present but marked missing, so it has no value to read.
    #[error("value of key {key} is missing")]
    MissingValue {
        /// The requested key.
        key: String,
    },

    /// The stored value cannot be represented as the requested type.
    #[error("type mismatch for key {key}: {message}")]
    TypeMismatch {
        /// The key involved.
        key: String,
        /// Description of the mismatch.
        message: String,
    },

    /// No sample template exists under this name.
    #[error("unknown sample: {name}")]
    UnknownSample {
        /// The requested sample name.
        name: String,
    },

    /// The handle was never issued or has already been released.
    #[error("invalid handle: {handle}")]
    InvalidHandle {
        /// Display form of the handle.
        handle: String,
    },

    /// The bytes do not form a valid frame, container or index file.
    #[error("corrupt data: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// Failed to encode a record or index body.
    #[error("encoding failed: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a record or index body.
    #[error("decoding failed: {message}")]
    Decoding {
        /// Description of the decoding error.
        message: String,
    },

    /// The key is not one of the index keys.
    #[error("key not indexed: {key}")]
    IndexKeyNotFound {
        /// The requested key.
        key: String,
    },

    /// The value does not occur among the indexed values of the key.
    #[error("value {value} not found in index for key {key}")]
    IndexValueNotFound {
        /// The index key.
        key: String,
        /// Text form of the value.
        value: String,
    },

    /// The key list an index is built over is unusable.
    #[error("invalid index keys: {message}")]
    InvalidIndexKeys {
        /// Description of the problem.
        message: String,
    },

    /// A record was requested from an index with an unselected key.
    #[error("index key not selected: {key}")]
    NotSelected {
        /// The first key without a selected value.
        key: String,
    },
}

impl CodecError {
    /// Creates a key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a corrupt data error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates an invalid handle error.
    pub fn invalid_handle(handle: impl std::fmt::Display) -> Self {
        Self::InvalidHandle {
            handle: handle.to_string(),
        }
    }

    /// Returns true if this is the "destination too small" condition.
    #[must_use]
    pub fn is_array_too_small(&self) -> bool {
        matches!(self, Self::ArrayTooSmall { .. })
    }
}
