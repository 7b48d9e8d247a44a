//! In-tree implementation of the codec traits.

use crate::api::{IndexCodec, IndexHandle, KeyIterHandle, RecordCodec, RecordHandle};
use crate::error::{CodecError, CodecResult};
use crate::frame::{decode_frame, encode_frame, read_frame, scan_frames};
use crate::index::{IndexTable, MISSING_TEXT, UNDEF_TEXT};
use crate::record::Record;
use crate::samples;
use crate::value::{NativeType, Value};
use bytes::Bytes;
use gribkit_storage::{FileBackend, StorageBackend, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default upper bound on a single frame: 64 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 64 * 1024 * 1024;

/// The native codec.
///
/// Decoded records, key cursors and index tables live in handle tables
/// behind one lock. Handle ids come from a single counter and are never
/// reused, so a released handle can never alias a live one.
///
/// # Example
///
/// ```rust
/// use gribkit_codec::{NativeCodec, RecordCodec, Value};
///
/// let codec = NativeCodec::new();
/// let handle = codec.new_handle_from_sample("GRIB2").unwrap();
/// assert_eq!(codec.get_scalar(handle, "Ni", None).unwrap(), Value::Long(2));
/// codec.release_handle(handle).unwrap();
/// ```
#[derive(Debug)]
pub struct NativeCodec {
    samples_path: Option<PathBuf>,
    max_message_size: u32,
    tables: Mutex<HandleTables>,
}

#[derive(Debug, Default)]
struct HandleTables {
    next_id: u64,
    records: HashMap<u64, Record>,
    iterators: HashMap<u64, KeyCursor>,
    indexes: HashMap<u64, IndexState>,
}

#[derive(Debug)]
struct KeyCursor {
    names: Vec<String>,
    position: Option<usize>,
}

#[derive(Debug, Clone)]
struct IndexState {
    table: IndexTable,
    selection: Vec<Option<String>>,
    cursor: usize,
}

impl HandleTables {
    fn issue(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_record(&mut self, record: Record) -> RecordHandle {
        let id = self.issue();
        self.records.insert(id, record);
        RecordHandle::new(id)
    }

    fn insert_index(&mut self, state: IndexState) -> IndexHandle {
        let id = self.issue();
        self.indexes.insert(id, state);
        IndexHandle::new(id)
    }

    fn record(&self, handle: RecordHandle) -> CodecResult<&Record> {
        self.records
            .get(&handle.as_u64())
            .ok_or_else(|| CodecError::invalid_handle(handle))
    }

    fn record_mut(&mut self, handle: RecordHandle) -> CodecResult<&mut Record> {
        self.records
            .get_mut(&handle.as_u64())
            .ok_or_else(|| CodecError::invalid_handle(handle))
    }

    fn iterator_mut(&mut self, iter: KeyIterHandle) -> CodecResult<&mut KeyCursor> {
        self.iterators
            .get_mut(&iter.as_u64())
            .ok_or_else(|| CodecError::invalid_handle(iter))
    }

    fn index(&self, index: IndexHandle) -> CodecResult<&IndexState> {
        self.indexes
            .get(&index.as_u64())
            .ok_or_else(|| CodecError::invalid_handle(index))
    }

    fn index_mut(&mut self, index: IndexHandle) -> CodecResult<&mut IndexState> {
        self.indexes
            .get_mut(&index.as_u64())
            .ok_or_else(|| CodecError::invalid_handle(index))
    }
}

impl IndexState {
    fn new(table: IndexTable) -> Self {
        let selection = vec![None; table.keys().len()];
        Self {
            table,
            selection,
            cursor: 0,
        }
    }
}

impl Default for NativeCodec {
    fn default() -> Self {
        Self {
            samples_path: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            tables: Mutex::new(HandleTables::default()),
        }
    }
}

impl NativeCodec {
    /// Creates a codec with built-in samples only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches `path` for `<name>.tmpl` before the built-in samples.
    #[must_use]
    pub fn with_samples_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.samples_path = Some(path.into());
        self
    }

    /// Sets the largest frame accepted when reading containers.
    #[must_use]
    pub fn with_max_message_size(mut self, size: u32) -> Self {
        self.max_message_size = size;
        self
    }

    /// Number of record handles currently live.
    #[must_use]
    pub fn live_records(&self) -> usize {
        self.tables.lock().records.len()
    }

    /// Number of index handles currently live.
    #[must_use]
    pub fn live_indexes(&self) -> usize {
        self.tables.lock().indexes.len()
    }

    /// Number of key cursors currently live.
    #[must_use]
    pub fn live_iterators(&self) -> usize {
        self.tables.lock().iterators.len()
    }

    fn load_sample(&self, name: &str) -> CodecResult<Record> {
        if let Some(dir) = &self.samples_path {
            let path = dir.join(format!("{name}.tmpl"));
            if path.is_file() {
                let bytes = std::fs::read(&path).map_err(StorageError::from)?;
                return decode_frame(&bytes);
            }
        }
        samples::builtin(name).ok_or_else(|| CodecError::UnknownSample {
            name: name.to_string(),
        })
    }
}

fn present<'a>(record: &'a Record, key: &str) -> CodecResult<&'a Value> {
    record.get(key)?.ok_or_else(|| CodecError::MissingValue {
        key: key.to_string(),
    })
}

impl RecordCodec for NativeCodec {
    fn count_in_file(&self, file: &dyn StorageBackend) -> CodecResult<usize> {
        Ok(scan_frames(file, self.max_message_size)?.len())
    }

    fn new_handle_from_file(
        &self,
        file: &dyn StorageBackend,
        offset: u64,
    ) -> CodecResult<Option<(RecordHandle, u64)>> {
        let Some((record, location)) = read_frame(file, offset, self.max_message_size)? else {
            return Ok(None);
        };
        let handle = self.tables.lock().insert_record(record);
        Ok(Some((handle, location.end())))
    }

    fn new_handle_from_sample(&self, name: &str) -> CodecResult<RecordHandle> {
        let record = self.load_sample(name)?;
        Ok(self.tables.lock().insert_record(record))
    }

    fn clone_handle(&self, handle: RecordHandle) -> CodecResult<RecordHandle> {
        let mut tables = self.tables.lock();
        let copy = tables.record(handle)?.clone();
        Ok(tables.insert_record(copy))
    }

    fn release_handle(&self, handle: RecordHandle) -> CodecResult<()> {
        self.tables
            .lock()
            .records
            .remove(&handle.as_u64())
            .map(|_| ())
            .ok_or_else(|| CodecError::invalid_handle(handle))
    }

    fn get_scalar(
        &self,
        handle: RecordHandle,
        key: &str,
        ty: Option<NativeType>,
    ) -> CodecResult<Value> {
        let tables = self.tables.lock();
        let value = present(tables.record(handle)?, key)?;
        if value.is_array() {
            return Err(CodecError::ArrayTooSmall {
                key: key.to_string(),
                len: value.len(),
            });
        }
        value.clone().into_scalar(key, ty)
    }

    fn get_array(
        &self,
        handle: RecordHandle,
        key: &str,
        ty: Option<NativeType>,
    ) -> CodecResult<Value> {
        let tables = self.tables.lock();
        present(tables.record(handle)?, key)?
            .clone()
            .into_array(key, ty)
    }

    fn set_scalar(&self, handle: RecordHandle, key: &str, value: &Value) -> CodecResult<()> {
        if value.is_array() {
            return Err(CodecError::type_mismatch(key, "scalar write of an array"));
        }
        self.tables.lock().record_mut(handle)?.set(key, value.clone())
    }

    fn set_array(&self, handle: RecordHandle, key: &str, value: &Value) -> CodecResult<()> {
        if !value.is_array() {
            return Err(CodecError::type_mismatch(key, "array write of a scalar"));
        }
        self.tables.lock().record_mut(handle)?.set(key, value.clone())
    }

    fn is_missing(&self, handle: RecordHandle, key: &str) -> CodecResult<bool> {
        self.tables.lock().record(handle)?.is_missing(key)
    }

    fn set_missing(&self, handle: RecordHandle, key: &str) -> CodecResult<()> {
        self.tables.lock().record_mut(handle)?.set_missing(key)
    }

    fn message_bytes(&self, handle: RecordHandle) -> CodecResult<Bytes> {
        encode_frame(self.tables.lock().record(handle)?)
    }

    fn new_key_iterator(
        &self,
        handle: RecordHandle,
        namespace: Option<&str>,
    ) -> CodecResult<KeyIterHandle> {
        let mut tables = self.tables.lock();
        let names = tables.record(handle)?.keys(namespace);
        let id = tables.issue();
        tables.iterators.insert(
            id,
            KeyCursor {
                names,
                position: None,
            },
        );
        Ok(KeyIterHandle::new(id))
    }

    fn advance(&self, iter: KeyIterHandle) -> CodecResult<bool> {
        let mut tables = self.tables.lock();
        let cursor = tables.iterator_mut(iter)?;
        let next = cursor.position.map_or(0, |p| p + 1).min(cursor.names.len());
        cursor.position = Some(next);
        Ok(next < cursor.names.len())
    }

    fn current_name(&self, iter: KeyIterHandle) -> CodecResult<String> {
        let mut tables = self.tables.lock();
        let cursor = tables.iterator_mut(iter)?;
        cursor
            .position
            .and_then(|p| cursor.names.get(p))
            .cloned()
            .ok_or_else(|| CodecError::invalid_handle(format!("{iter} (no current key)")))
    }

    fn dispose_iterator(&self, iter: KeyIterHandle) -> CodecResult<()> {
        self.tables
            .lock()
            .iterators
            .remove(&iter.as_u64())
            .map(|_| ())
            .ok_or_else(|| CodecError::invalid_handle(iter))
    }
}

impl IndexCodec for NativeCodec {
    fn new_index_from_file(&self, path: &Path, keys: &[String]) -> CodecResult<IndexHandle> {
        let mut table = IndexTable::new(keys.to_vec())?;
        table.add_file(path, self.max_message_size)?;
        Ok(self.tables.lock().insert_index(IndexState::new(table)))
    }

    fn read_index(&self, path: &Path) -> CodecResult<IndexHandle> {
        let store = FileBackend::open_read_only(path)?;
        let size = usize::try_from(store.size()?)
            .map_err(|_| CodecError::corrupt("index file too large"))?;
        let table = IndexTable::from_bytes(&store.read_at(0, size)?)?;
        Ok(self.tables.lock().insert_index(IndexState::new(table)))
    }

    fn clone_index(&self, index: IndexHandle) -> CodecResult<IndexHandle> {
        let mut tables = self.tables.lock();
        let copy = tables.index(index)?.clone();
        Ok(tables.insert_index(copy))
    }

    fn index_add_file(&self, index: IndexHandle, path: &Path) -> CodecResult<()> {
        let mut tables = self.tables.lock();
        tables
            .index_mut(index)?
            .table
            .add_file(path, self.max_message_size)
            .map(|_| ())
    }

    fn index_keys(&self, index: IndexHandle) -> CodecResult<Vec<String>> {
        Ok(self.tables.lock().index(index)?.table.keys().to_vec())
    }

    fn index_distinct_count(&self, index: IndexHandle, key: &str) -> CodecResult<usize> {
        Ok(self.tables.lock().index(index)?.table.distinct(key)?.len())
    }

    fn index_distinct_values(
        &self,
        index: IndexHandle,
        key: &str,
        ty: NativeType,
    ) -> CodecResult<Vec<Value>> {
        let tables = self.tables.lock();
        tables
            .index(index)?
            .table
            .distinct(key)?
            .into_iter()
            .map(|text| match text {
                MISSING_TEXT | UNDEF_TEXT => Ok(Value::Text(text.to_string())),
                _ => Value::parse_text(key, text, ty),
            })
            .collect()
    }

    fn index_write(&self, index: IndexHandle, path: &Path) -> CodecResult<()> {
        let bytes = self.tables.lock().index(index)?.table.to_bytes()?;
        let mut out = FileBackend::create(path)?;
        out.append(&bytes)?;
        out.sync()?;
        Ok(())
    }

    fn index_select(&self, index: IndexHandle, key: &str, value: &Value) -> CodecResult<()> {
        let mut tables = self.tables.lock();
        let state = tables.index_mut(index)?;
        let pos = state.table.position(key)?;
        let text = value.to_text();
        if !state.table.distinct(key)?.contains(text.as_str()) {
            return Err(CodecError::IndexValueNotFound {
                key: key.to_string(),
                value: text,
            });
        }
        state.selection[pos] = Some(text);
        state.cursor = 0;
        Ok(())
    }

    fn new_handle_from_index(&self, index: IndexHandle) -> CodecResult<Option<RecordHandle>> {
        let mut tables = self.tables.lock();
        let state = tables.index_mut(index)?;

        let mut selection = Vec::with_capacity(state.selection.len());
        for (key, chosen) in state.table.keys().iter().zip(&state.selection) {
            match chosen {
                Some(text) => selection.push(text.clone()),
                None => return Err(CodecError::NotSelected { key: key.clone() }),
            }
        }

        let (pos, record) = match state.table.find_match(&selection, state.cursor) {
            Some((pos, entry)) => (pos, state.table.read_record(entry)?),
            None => return Ok(None),
        };
        state.cursor = pos + 1;
        Ok(Some(tables.insert_record(record)))
    }

    fn release_index(&self, index: IndexHandle) -> CodecResult<()> {
        self.tables
            .lock()
            .indexes
            .remove(&index.as_u64())
            .map(|_| ())
            .ok_or_else(|| CodecError::invalid_handle(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gribkit_storage::InMemoryBackend;
    use tempfile::tempdir;

    fn field(step: &str) -> Record {
        Record::builder()
            .field_in("dataDate", &["ls"], 20110225)
            .field_in("stepRange", &["ls", "time"], step)
            .field_in("pl", &["geography"], vec![4i64, 8, 4])
            .missing_in("scaleFactorOfSecondFixedSurface", &[])
            .field("values", vec![1.0, 2.0, 3.0])
            .build()
    }

    fn container(steps: &[&str]) -> InMemoryBackend {
        let mut store = InMemoryBackend::new();
        for step in steps {
            store.append(&encode_frame(&field(step)).unwrap()).unwrap();
        }
        store
    }

    #[test]
    fn reads_records_in_file_order() {
        let codec = NativeCodec::new();
        let store = container(&["0", "6"]);
        assert_eq!(codec.count_in_file(&store).unwrap(), 2);

        let (first, next) = codec.new_handle_from_file(&store, 0).unwrap().unwrap();
        let (second, end) = codec.new_handle_from_file(&store, next).unwrap().unwrap();
        assert!(codec.new_handle_from_file(&store, end).unwrap().is_none());
        assert_ne!(first, second);

        assert_eq!(
            codec.get_scalar(second, "stepRange", None).unwrap(),
            Value::Text("6".into())
        );
        assert_eq!(codec.live_records(), 2);
    }

    #[test]
    fn scalar_read_of_array_reports_too_small() {
        let codec = NativeCodec::new();
        let store = container(&["0"]);
        let (h, _) = codec.new_handle_from_file(&store, 0).unwrap().unwrap();

        let err = codec.get_scalar(h, "pl", None).unwrap_err();
        assert!(matches!(err, CodecError::ArrayTooSmall { len: 3, .. }));
        assert!(err.is_array_too_small());
        assert_eq!(
            codec.get_array(h, "pl", None).unwrap(),
            Value::LongArray(vec![4, 8, 4])
        );

        codec.set_array(h, "pl", &Value::LongArray(vec![7])).unwrap();
        assert!(matches!(
            codec.get_scalar(h, "pl", None),
            Err(CodecError::ArrayTooSmall { len: 1, .. })
        ));
        assert_eq!(
            codec.get_array(h, "pl", None).unwrap(),
            Value::LongArray(vec![7])
        );
    }

    #[test]
    fn missing_values_and_absent_keys() {
        let codec = NativeCodec::new();
        let h = codec.new_handle_from_sample("GRIB2").unwrap();

        assert!(codec.is_missing(h, "scaleFactorOfSecondFixedSurface").unwrap());
        assert!(matches!(
            codec.get_scalar(h, "scaleFactorOfSecondFixedSurface", None),
            Err(CodecError::MissingValue { .. })
        ));
        codec
            .set_scalar(h, "scaleFactorOfSecondFixedSurface", &Value::Long(5))
            .unwrap();
        assert!(!codec.is_missing(h, "scaleFactorOfSecondFixedSurface").unwrap());

        assert!(matches!(
            codec.is_missing(h, "noSuchKey"),
            Err(CodecError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn scalar_and_array_paths_check_the_tag() {
        let codec = NativeCodec::new();
        let h = codec.new_handle_from_sample("GRIB2").unwrap();
        assert!(matches!(
            codec.set_scalar(h, "values", &Value::DoubleArray(vec![1.0])),
            Err(CodecError::TypeMismatch { .. })
        ));
        assert!(matches!(
            codec.set_array(h, "Ni", &Value::Long(3)),
            Err(CodecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn released_handles_stay_invalid() {
        let codec = NativeCodec::new();
        let h = codec.new_handle_from_sample("GRIB2").unwrap();
        let copy = codec.clone_handle(h).unwrap();
        codec.release_handle(h).unwrap();

        assert!(matches!(
            codec.release_handle(h),
            Err(CodecError::InvalidHandle { .. })
        ));
        assert!(matches!(
            codec.get_scalar(h, "Ni", None),
            Err(CodecError::InvalidHandle { .. })
        ));
        let fresh = codec.new_handle_from_sample("GRIB2").unwrap();
        assert_ne!(fresh, h);
        assert_eq!(codec.get_scalar(copy, "Ni", None).unwrap(), Value::Long(2));
    }

    #[test]
    fn key_cursor_walks_then_stops() {
        let codec = NativeCodec::new();
        let store = container(&["0"]);
        let (h, _) = codec.new_handle_from_file(&store, 0).unwrap().unwrap();

        let it = codec.new_key_iterator(h, Some("time")).unwrap();
        assert!(codec.current_name(it).is_err());
        assert!(codec.advance(it).unwrap());
        assert_eq!(codec.current_name(it).unwrap(), "stepRange");
        assert!(!codec.advance(it).unwrap());
        assert!(!codec.advance(it).unwrap());
        codec.dispose_iterator(it).unwrap();
        assert_eq!(codec.live_iterators(), 0);
    }

    #[test]
    fn samples_from_directory_take_precedence() {
        let dir = tempdir().unwrap();
        let custom = Record::builder().field("shortName", "msl").build();
        std::fs::write(
            dir.path().join("GRIB2.tmpl"),
            encode_frame(&custom).unwrap(),
        )
        .unwrap();

        let codec = NativeCodec::new().with_samples_path(dir.path());
        let h = codec.new_handle_from_sample("GRIB2").unwrap();
        assert_eq!(
            codec.get_scalar(h, "shortName", None).unwrap(),
            Value::Text("msl".into())
        );
        assert!(matches!(
            codec.new_handle_from_sample("GRIB7"),
            Err(CodecError::UnknownSample { .. })
        ));
    }

    #[test]
    fn index_select_cursor_and_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fc.grib2");
        std::fs::write(&path, container(&["0", "6", "0"]).data()).unwrap();

        let codec = NativeCodec::new();
        let keys = vec!["dataDate".to_string(), "stepRange".to_string()];
        let idx = codec.new_index_from_file(&path, &keys).unwrap();

        assert_eq!(codec.index_distinct_count(idx, "stepRange").unwrap(), 2);
        assert_eq!(
            codec
                .index_distinct_values(idx, "dataDate", NativeType::Long)
                .unwrap(),
            vec![Value::Long(20110225)]
        );

        codec.index_select(idx, "stepRange", &Value::Long(0)).unwrap();
        assert!(matches!(
            codec.new_handle_from_index(idx),
            Err(CodecError::NotSelected { .. })
        ));
        codec
            .index_select(idx, "dataDate", &Value::Long(20110225))
            .unwrap();
        assert!(codec.new_handle_from_index(idx).unwrap().is_some());
        assert!(codec.new_handle_from_index(idx).unwrap().is_some());
        assert!(codec.new_handle_from_index(idx).unwrap().is_none());

        assert!(matches!(
            codec.index_select(idx, "stepRange", &Value::Long(12)),
            Err(CodecError::IndexValueNotFound { .. })
        ));

        let index_path = dir.path().join("fc.idx");
        codec.index_write(idx, &index_path).unwrap();
        let loaded = codec.read_index(&index_path).unwrap();
        assert_eq!(codec.index_keys(loaded).unwrap(), keys);
        codec.index_add_file(loaded, &path).unwrap();
        assert_eq!(codec.index_distinct_count(loaded, "stepRange").unwrap(), 2);

        codec.release_index(idx).unwrap();
        codec.release_index(loaded).unwrap();
        assert_eq!(codec.live_indexes(), 0);
    }

    #[test]
    fn distinct_values_keep_missing_markers_as_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("levels.grib2");
        let mut store = InMemoryBackend::new();
        let present = Record::builder().field_in("level", &["vertical"], 500).build();
        let missing = Record::builder().missing_in("level", &["vertical"]).build();
        let absent = Record::builder().field("shortName", "msl").build();
        for record in [&present, &missing, &absent] {
            store.append(&encode_frame(record).unwrap()).unwrap();
        }
        std::fs::write(&path, store.data()).unwrap();

        let codec = NativeCodec::new();
        let idx = codec
            .new_index_from_file(&path, &["level".to_string()])
            .unwrap();
        assert_eq!(
            codec
                .index_distinct_values(idx, "level", NativeType::Long)
                .unwrap(),
            vec![
                Value::Long(500),
                Value::Text(MISSING_TEXT.into()),
                Value::Text(UNDEF_TEXT.into()),
            ]
        );
        assert_eq!(
            codec
                .index_distinct_values(idx, "level", NativeType::Double)
                .unwrap()[0],
            Value::Double(500.0)
        );
    }
}
