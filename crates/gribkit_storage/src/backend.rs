//! The byte-store trait containers and write sinks are built on.

use crate::error::StorageResult;

/// Random-access reads plus append-only writes over a flat byte sequence.
///
/// A container is read by seeking from frame to frame with `read_at`; a
/// message write appends one whole frame and flushes. Nothing here knows
/// where one frame ends and the next begins.
///
/// Implementations must keep appended bytes readable at the offset
/// `append` returned for them.
pub trait StorageBackend: Send + Sync {
    /// Reads exactly `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// [`crate::StorageError::ReadPastEnd`] when the range is not fully
    /// inside the store, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it starts at.
    ///
    /// # Errors
    ///
    /// [`crate::StorageError::ReadOnly`] for stores opened read-only, or an
    /// I/O error.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered appends to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Current length of the store in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Flushes and waits until appended data is on disk.
    fn sync(&mut self) -> StorageResult<()>;
}
