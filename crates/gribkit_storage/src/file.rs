//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// Container files are usually opened read-only; a writable backend is
/// needed only when messages are appended back to the container they came
/// from, or when a fresh output file is created as a write sink.
///
/// # Example
///
/// ```no_run
/// use gribkit_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut out = FileBackend::create(Path::new("out.grib2")).unwrap();
/// out.append(b"GRIB").unwrap();
/// out.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
    writable: bool,
}

impl FileBackend {
    /// Opens an existing file for reading and appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::from_file(path, file, true)
    }

    /// Opens an existing file for reading only.
    ///
    /// Appends to a read-only backend fail with [`StorageError::ReadOnly`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::from_file(path, file, false)
    }

    /// Creates a new file, truncating any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::from_file(path, file, true)
    }

    fn from_file(path: &Path, file: File, writable: bool) -> StorageResult<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
            writable,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the backend accepts appends.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if !self.writable {
            return Err(StorageError::ReadOnly {
                path: self.path.display().to_string(),
            });
        }

        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.writable {
            self.file.write().flush()?;
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.writable {
            self.file.write().sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.grib2");

        assert!(matches!(FileBackend::open(&path), Err(StorageError::Io(_))));
        assert!(matches!(
            FileBackend::open_read_only(&path),
            Err(StorageError::Io(_))
        ));
    }

    #[test]
    fn create_then_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.grib2");

        let mut backend = FileBackend::create(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);

        assert_eq!(backend.append(b"GRIB").unwrap(), 0);
        assert_eq!(backend.append(b"7777").unwrap(), 4);
        assert_eq!(backend.size().unwrap(), 8);
        assert_eq!(backend.read_at(0, 8).unwrap(), b"GRIB7777");
        assert_eq!(backend.read_at(4, 4).unwrap(), b"7777");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.grib2");

        let mut backend = FileBackend::create(&path).unwrap();
        backend.append(b"GRIB").unwrap();

        let result = backend.read_at(2, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn read_only_rejects_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.grib2");
        std::fs::write(&path, b"GRIB").unwrap();

        let mut backend = FileBackend::open_read_only(&path).unwrap();
        assert!(!backend.is_writable());
        assert_eq!(backend.read_at(0, 4).unwrap(), b"GRIB");

        let result = backend.append(b"more");
        assert!(matches!(result, Err(StorageError::ReadOnly { .. })));
        assert_eq!(backend.size().unwrap(), 4);
        assert!(backend.flush().is_ok());
    }

    #[test]
    fn reopen_sees_appended_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.grib2");
        std::fs::write(&path, b"GRIB").unwrap();

        {
            let mut backend = FileBackend::open(&path).unwrap();
            assert_eq!(backend.append(b"7777").unwrap(), 4);
            backend.sync().unwrap();
        }

        let backend = FileBackend::open_read_only(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 8);
        assert_eq!(backend.path(), path);
    }
}
