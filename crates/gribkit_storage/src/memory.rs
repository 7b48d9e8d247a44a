//! Byte store held in memory.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// A [`StorageBackend`] over a growable buffer.
///
/// Used as the write sink for `Message::write` in tests and as the store
/// behind containers that never touch the file system.
///
/// ```rust
/// use gribkit_storage::{InMemoryBackend, StorageBackend};
///
/// let mut sink = InMemoryBackend::new();
/// assert_eq!(sink.append(b"GRIB").unwrap(), 0);
/// assert_eq!(sink.append(b"7777").unwrap(), 4);
/// assert_eq!(sink.data(), b"GRIB7777");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    buf: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with `bytes`, e.g. a container read from elsewhere.
    #[must_use]
    pub fn with_data(bytes: Vec<u8>) -> Self {
        Self {
            buf: RwLock::new(bytes),
        }
    }

    /// Snapshot of everything written so far.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.buf.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let buf = self.buf.read();
        let past_end = || StorageError::ReadPastEnd {
            offset,
            len,
            size: buf.len() as u64,
        };
        let start = usize::try_from(offset).map_err(|_| past_end())?;
        let end = start.checked_add(len).ok_or_else(past_end)?;
        buf.get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(past_end)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let buf = self.buf.get_mut();
        let at = buf.len() as u64;
        buf.extend_from_slice(bytes);
        Ok(at)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.buf.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }
}
