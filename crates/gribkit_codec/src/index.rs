//! Index table: key values of every record across one or more containers.
//!
//! ## Format
//!
//! ```text
//! IndexFile {
//!     magic: "GKIX"
//!     version: u8
//!     body: CBOR { keys, files, entries: [(values, file, offset, length)] }
//! }
//! ```
//!
//! Entries point back into the source containers by file id and frame
//! location; records are decoded from there on demand.

use crate::error::{CodecError, CodecResult};
use crate::frame::{decode_frame, read_frame};
use crate::record::Record;
use gribkit_storage::{FileBackend, StorageBackend};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Magic bytes for index files: "GKIX"
const INDEX_MAGIC: [u8; 4] = *b"GKIX";

/// Current index file format version.
const INDEX_VERSION: u8 = 1;

/// Index text of a key that is marked missing in a record.
pub const MISSING_TEXT: &str = "MISSING";

/// Index text of a key that is absent from a record.
pub const UNDEF_TEXT: &str = "undef";

/// One indexed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Text of each index key, in key order.
    pub values: Vec<String>,
    /// Position of the source file in the table's file list.
    pub file: u32,
    /// Frame offset in the source file.
    pub offset: u64,
    /// Frame length.
    pub length: u32,
}

/// The key/value table behind an index handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTable {
    keys: Vec<String>,
    files: Vec<PathBuf>,
    entries: Vec<IndexEntry>,
}

impl IndexTable {
    /// Creates an empty table over `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidIndexKeys`] if `keys` is empty or
    /// repeats a key.
    pub fn new(keys: Vec<String>) -> CodecResult<Self> {
        validate_keys(&keys)?;
        Ok(Self {
            keys,
            files: Vec::new(),
            entries: Vec::new(),
        })
    }

    /// The index keys.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Source files, in the order they were added.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// All indexed records.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Indexes every record of the container at `path`.
    ///
    /// Returns the number of records added. Nothing is added if any frame
    /// fails to decode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a valid
    /// container.
    pub fn add_file(&mut self, path: &Path, max_len: u32) -> CodecResult<usize> {
        let store = FileBackend::open_read_only(path)?;
        let file = u32::try_from(self.files.len())
            .map_err(|_| CodecError::corrupt("too many files in index"))?;

        let mut added = Vec::new();
        let mut offset = 0;
        while let Some((record, location)) = read_frame(&store, offset, max_len)? {
            offset = location.end();
            added.push(IndexEntry {
                values: self.keys.iter().map(|k| index_text(&record, k)).collect(),
                file,
                offset: location.offset,
                length: location.length,
            });
        }

        let count = added.len();
        self.files.push(path.to_path_buf());
        self.entries.extend(added);
        Ok(count)
    }

    /// Position of `key` among the index keys.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::IndexKeyNotFound`] if `key` is not indexed.
    pub fn position(&self, key: &str) -> CodecResult<usize> {
        self.keys
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| CodecError::IndexKeyNotFound {
                key: key.to_string(),
            })
    }

    /// Distinct texts seen for `key`, in ascending lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::IndexKeyNotFound`] if `key` is not indexed.
    pub fn distinct(&self, key: &str) -> CodecResult<BTreeSet<&str>> {
        let pos = self.position(key)?;
        Ok(self
            .entries
            .iter()
            .map(|e| e.values[pos].as_str())
            .collect())
    }

    /// First entry at or after `from` whose values equal `selection`.
    #[must_use]
    pub fn find_match(&self, selection: &[String], from: usize) -> Option<(usize, &IndexEntry)> {
        self.entries
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, e)| e.values == selection)
    }

    /// Decodes the record an entry points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the source file is gone or no longer holds a
    /// valid frame at the recorded location.
    pub fn read_record(&self, entry: &IndexEntry) -> CodecResult<Record> {
        let path = self
            .files
            .get(entry.file as usize)
            .ok_or_else(|| CodecError::corrupt(format!("unknown file id {}", entry.file)))?;
        let store = FileBackend::open_read_only(path)?;
        let bytes = store.read_at(entry.offset, entry.length as usize)?;
        decode_frame(&bytes)
    }

    /// Serializes the table to index file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encoding`] if the body cannot be encoded.
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&INDEX_MAGIC);
        buf.push(INDEX_VERSION);
        ciborium::into_writer(self, &mut buf).map_err(|e| CodecError::Encoding {
            message: e.to_string(),
        })?;
        Ok(buf)
    }

    /// Parses index file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Corrupt`] for a bad header or inconsistent
    /// entries, [`CodecError::Decoding`] for an undecodable body.
    pub fn from_bytes(data: &[u8]) -> CodecResult<Self> {
        if data.len() < INDEX_MAGIC.len() + 1 {
            return Err(CodecError::corrupt("index file too small"));
        }
        if data[..4] != INDEX_MAGIC {
            return Err(CodecError::corrupt("invalid index file magic"));
        }
        let version = data[4];
        if version != INDEX_VERSION {
            return Err(CodecError::corrupt(format!(
                "unsupported index version: {version}"
            )));
        }

        let table: IndexTable =
            ciborium::from_reader(&data[5..]).map_err(|e| CodecError::Decoding {
                message: e.to_string(),
            })?;

        validate_keys(&table.keys).map_err(|e| CodecError::corrupt(e.to_string()))?;
        let consistent = table.entries.iter().all(|e| {
            e.values.len() == table.keys.len() && (e.file as usize) < table.files.len()
        });
        if !consistent {
            return Err(CodecError::corrupt("index entries do not match keys or files"));
        }
        Ok(table)
    }
}

fn validate_keys(keys: &[String]) -> CodecResult<()> {
    if keys.is_empty() {
        return Err(CodecError::InvalidIndexKeys {
            message: "at least one key is required".to_string(),
        });
    }
    let mut seen = HashSet::new();
    if let Some(dup) = keys.iter().find(|k| !seen.insert(k.as_str())) {
        return Err(CodecError::InvalidIndexKeys {
            message: format!("duplicate key {dup}"),
        });
    }
    Ok(())
}

fn index_text(record: &Record, key: &str) -> String {
    match record.get(key) {
        Ok(Some(value)) => value.to_text(),
        Ok(None) => MISSING_TEXT.to_string(),
        Err(_) => UNDEF_TEXT.to_string(),
    }
}
