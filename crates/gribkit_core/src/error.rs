//! Error types for gribkit core.

use gribkit_codec::CodecError;
use gribkit_storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type GribResult<T> = Result<T, GribError>;

/// The kind of handle an operation was invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// A [`crate::Container`].
    Container,
    /// A [`crate::Message`].
    Message,
    /// An [`crate::Index`].
    Index,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Container => f.write_str("container"),
            HandleKind::Message => f.write_str("message"),
            HandleKind::Index => f.write_str("index"),
        }
    }
}

/// Errors raised by containers, messages and indexes.
///
/// Nothing here is retried internally; every error reaches the caller.
#[derive(Debug, Error)]
pub enum GribError {
    /// A handle could not be acquired, opened or written.
    #[error("resource error: {message}")]
    Resource {
        /// Description of the failure.
        message: String,
    },

    /// The key exists but its value is marked missing.
    #[error("value of key {key} is missing")]
    MissingKey {
        /// The requested key.
        key: String,
    },

    /// The key is not present in the message or index at all.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The requested key.
        key: String,
    },

    /// An index was used without a complete, valid selection.
    #[error("selection error: {message}")]
    Selection {
        /// Description of what is wrong with the selection.
        message: String,
    },

    /// The handle has already been closed.
    #[error("{kind} used after close")]
    UseAfterClose {
        /// Which kind of handle was closed.
        kind: HandleKind,
    },

    /// Any other codec failure, passed through unchanged.
    #[error("codec error: {0}")]
    Codec(CodecError),
}

impl GribError {
    /// Creates a resource error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }

    /// Creates a selection error.
    pub fn selection(message: impl Into<String>) -> Self {
        Self::Selection {
            message: message.into(),
        }
    }

    /// Creates a use-after-close error.
    pub fn use_after_close(kind: HandleKind) -> Self {
        Self::UseAfterClose { kind }
    }
}

impl From<CodecError> for GribError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::KeyNotFound { key } | CodecError::IndexKeyNotFound { key } => {
                Self::KeyNotFound { key }
            }
            CodecError::MissingValue { key } => Self::MissingKey { key },
            e @ (CodecError::IndexValueNotFound { .. } | CodecError::NotSelected { .. }) => {
                Self::selection(e.to_string())
            }
            e @ (CodecError::Storage(_)
            | CodecError::UnknownSample { .. }
            | CodecError::Corrupt { .. }
            | CodecError::Encoding { .. }
            | CodecError::Decoding { .. }) => Self::resource(e.to_string()),
            other => Self::Codec(other),
        }
    }
}

impl From<StorageError> for GribError {
    fn from(err: StorageError) -> Self {
        Self::resource(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_errors_map_onto_the_taxonomy() {
        assert!(matches!(
            GribError::from(CodecError::key_not_found("shortName")),
            GribError::KeyNotFound { .. }
        ));
        assert!(matches!(
            GribError::from(CodecError::IndexKeyNotFound { key: "step".into() }),
            GribError::KeyNotFound { .. }
        ));
        assert!(matches!(
            GribError::from(CodecError::MissingValue { key: "level".into() }),
            GribError::MissingKey { .. }
        ));
        assert!(matches!(
            GribError::from(CodecError::UnknownSample { name: "x".into() }),
            GribError::Resource { .. }
        ));
        assert!(matches!(
            GribError::from(CodecError::corrupt("bad magic")),
            GribError::Resource { .. }
        ));
        assert!(matches!(
            GribError::from(CodecError::NotSelected { key: "step".into() }),
            GribError::Selection { .. }
        ));
        assert!(matches!(
            GribError::from(CodecError::type_mismatch("shortName", "not a long")),
            GribError::Codec(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn storage_errors_are_resource_errors() {
        let err = GribError::from(StorageError::ReadOnly {
            path: "fc.grib2".into(),
        });
        assert!(matches!(err, GribError::Resource { .. }));
        assert!(err.to_string().contains("fc.grib2"));
    }

    #[test]
    fn use_after_close_names_the_handle() {
        let err = GribError::use_after_close(HandleKind::Message);
        assert_eq!(err.to_string(), "message used after close");
    }
}
