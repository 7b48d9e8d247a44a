//! Index handles.
//!
//! An [`Index`] records the values of a fixed set of keys for every
//! message in one or more containers. Once a value has been selected for
//! every indexed key, [`Index::select_message`] hands out the matching
//! messages one at a time.

use crate::error::{GribError, GribResult, HandleKind};
use crate::message::Message;
use crate::registry::{MessageId, OwnerKind, Registry, SharedRegistry};
use gribkit_codec::{Codec, IndexHandle, NativeType, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A key/value index over the messages of one or more containers.
///
/// Messages produced by a selection are owned by the index and are closed
/// with it. Dropping an index closes it.
///
/// # Example
///
/// ```no_run
/// use gribkit_core::Index;
///
/// let mut index = Index::build("forecast.grib2", &["dataDate", "stepRange"])?;
/// index.select([("dataDate", 20110225_i64), ("stepRange", 12)])?;
/// let message = index.select_message()?;
/// assert_eq!(message.get_string("stepRange")?, "12");
/// # Ok::<(), gribkit_core::GribError>(())
/// ```
pub struct Index {
    codec: Arc<dyn Codec>,
    handle: Option<IndexHandle>,
    keys: Option<Vec<String>>,
    registry: SharedRegistry,
    selection: Option<BTreeMap<String, Value>>,
}

impl Index {
    /// Builds an index over `keys` from a container file, using a default
    /// [`Context`](crate::Context).
    ///
    /// # Errors
    ///
    /// Returns [`GribError::Resource`] if the file cannot be read.
    pub fn build<S: AsRef<str>>(path: impl AsRef<Path>, keys: &[S]) -> GribResult<Self> {
        crate::Context::default().build_index(path, keys)
    }

    /// Loads an index file written by [`Index::write`], using a default
    /// [`Context`](crate::Context).
    ///
    /// # Errors
    ///
    /// Returns [`GribError::Resource`] if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> GribResult<Self> {
        crate::Context::default().load_index(path)
    }

    pub(crate) fn from_handle(
        codec: Arc<dyn Codec>,
        handle: IndexHandle,
        keys: Option<Vec<String>>,
    ) -> Self {
        debug!(%handle, keys = ?keys, "index opened");
        Self {
            codec,
            handle: Some(handle),
            keys,
            registry: Registry::shared(OwnerKind::Index, None),
            selection: None,
        }
    }

    fn handle(&self) -> GribResult<IndexHandle> {
        self.handle
            .ok_or_else(|| GribError::use_after_close(HandleKind::Index))
    }

    /// The keys the index was built with, or `None` for a loaded index.
    #[must_use]
    pub fn keys(&self) -> Option<&[String]> {
        self.keys.as_deref()
    }

    /// The keys the index actually holds, whether built or loaded.
    pub fn indexed_keys(&self) -> GribResult<Vec<String>> {
        let handle = self.handle()?;
        Ok(self.codec.index_keys(handle)?)
    }

    /// Whether the index can still be used.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Adds the messages of another container file under the same keys.
    pub fn add(&mut self, path: impl AsRef<Path>) -> GribResult<()> {
        let handle = self.handle()?;
        self.codec.index_add_file(handle, path.as_ref())?;
        debug!(%handle, path = %path.as_ref().display(), "file added to index");
        Ok(())
    }

    /// Number of distinct values of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GribError::KeyNotFound`] if `key` is not indexed.
    pub fn size(&self, key: &str) -> GribResult<usize> {
        let handle = self.handle()?;
        Ok(self.codec.index_distinct_count(handle, key)?)
    }

    /// Distinct values of `key`, read as `ty` (text when `None`).
    ///
    /// Values are ordered by their text form.
    pub fn values(&self, key: &str, ty: Option<NativeType>) -> GribResult<Vec<Value>> {
        let handle = self.handle()?;
        let ty = ty.unwrap_or(NativeType::Text);
        Ok(self.codec.index_distinct_values(handle, key, ty)?)
    }

    /// Writes the index to a file that [`Index::load`] can read back.
    pub fn write(&self, path: impl AsRef<Path>) -> GribResult<()> {
        let handle = self.handle()?;
        self.codec.index_write(handle, path.as_ref())?;
        Ok(())
    }

    /// Selects one value for every indexed key.
    ///
    /// The mapping is checked as a whole before anything is applied, so a
    /// rejected selection leaves the previous one in place.
    ///
    /// # Errors
    ///
    /// Returns [`GribError::Selection`] if an indexed key has no value, a
    /// key is not indexed, or a value does not occur in the index.
    pub fn select<K, V>(&mut self, mapping: impl IntoIterator<Item = (K, V)>) -> GribResult<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let handle = self.handle()?;
        let mapping: BTreeMap<String, Value> = mapping
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let keys = self.codec.index_keys(handle)?;

        if let Some(extra) = mapping.keys().find(|k| !keys.contains(k)) {
            return Err(GribError::selection(format!("key {extra} is not indexed")));
        }
        let unselected: Vec<&str> = keys
            .iter()
            .filter(|k| !mapping.contains_key(*k))
            .map(String::as_str)
            .collect();
        if !unselected.is_empty() {
            return Err(GribError::selection(format!(
                "no value given for indexed keys: {}",
                unselected.join(", ")
            )));
        }
        for (key, value) in &mapping {
            let text = value.to_text();
            let known = self
                .codec
                .index_distinct_values(handle, key, NativeType::Text)?;
            if !known.iter().any(|v| v.as_text() == Some(text.as_str())) {
                return Err(GribError::selection(format!(
                    "value {text} does not occur for key {key}"
                )));
            }
        }

        for (key, value) in &mapping {
            self.codec.index_select(handle, key, value)?;
        }
        debug!(%handle, selection = ?mapping, "index selection set");
        self.selection = Some(mapping);
        Ok(())
    }

    /// The active selection, if any.
    #[must_use]
    pub fn selection(&self) -> Option<&BTreeMap<String, Value>> {
        self.selection.as_ref()
    }

    /// The next message matching the selection, or `Ok(None)` once every
    /// match has been handed out.
    ///
    /// # Errors
    ///
    /// Returns [`GribError::Selection`] if no selection has been made.
    pub fn next_selected(&mut self) -> GribResult<Option<Message>> {
        let handle = self.handle()?;
        if self.selection.is_none() {
            return Err(GribError::selection("no selection has been made"));
        }
        match self.codec.new_handle_from_index(handle)? {
            Some(record) => {
                Message::owned(Arc::clone(&self.codec), &self.registry, record).map(Some)
            }
            None => Ok(None),
        }
    }

    /// The next message matching the selection.
    ///
    /// # Errors
    ///
    /// Returns [`GribError::Selection`] if no selection has been made or no
    /// further message matches it.
    pub fn select_message(&mut self) -> GribResult<Message> {
        self.next_selected()?
            .ok_or_else(|| GribError::selection("no further message matches the selection"))
    }

    /// Duplicates the index, selection included. The copy has its own set
    /// of open messages.
    pub fn try_clone(&self) -> GribResult<Index> {
        let handle = self.handle()?;
        let copy = self.codec.clone_index(handle)?;
        let mut index = Index::from_handle(Arc::clone(&self.codec), copy, self.keys.clone());
        index.selection = self.selection.clone();
        Ok(index)
    }

    /// Number of messages produced by this index that are still open.
    #[must_use]
    pub fn open_message_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Ids of the messages produced by this index that are still open,
    /// oldest first.
    #[must_use]
    pub fn open_message_ids(&self) -> Vec<MessageId> {
        self.registry.lock().ids()
    }

    /// Closes every open message, then the index itself. Closing twice
    /// does nothing.
    pub fn close(&mut self) -> GribResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let records = self.registry.lock().drain();
        let released = records.len();
        let mut first_err: Option<GribError> = None;
        for record in records {
            if let Err(e) = self.codec.release_handle(record) {
                first_err.get_or_insert(e.into());
            }
        }
        if let Err(e) = self.codec.release_index(handle) {
            first_err.get_or_insert(e.into());
        }

        debug!(%handle, released, "index closed");
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close index on drop");
        }
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("handle", &self.handle)
            .field("keys", &self.keys)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gribkit_codec::{encode_frame, IndexCodec, NativeCodec, Record};
    use gribkit_storage::{FileBackend, StorageBackend};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, steps: &[&str]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = FileBackend::create(&path).unwrap();
        for step in steps {
            let record = Record::builder()
                .field_in("dataDate", &["ls"], 20110225)
                .field_in("stepRange", &["ls"], *step)
                .field("values", vec![0.0])
                .build();
            file.append(&encode_frame(&record).unwrap()).unwrap();
        }
        file.sync().unwrap();
        path
    }

    fn build(codec: &Arc<NativeCodec>, path: &Path) -> Index {
        let keys = vec!["dataDate".to_string(), "stepRange".to_string()];
        let handle = codec.new_index_from_file(path, &keys).unwrap();
        Index::from_handle(Arc::clone(codec) as Arc<dyn Codec>, handle, Some(keys))
    }

    #[test]
    fn selection_must_be_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.grib", &["0", "6"]);
        let codec = Arc::new(NativeCodec::new());
        let mut index = build(&codec, &path);

        assert!(matches!(
            index.select_message(),
            Err(GribError::Selection { .. })
        ));
        assert!(matches!(
            index.select([("stepRange", "6")]),
            Err(GribError::Selection { .. })
        ));
        assert!(matches!(
            index.select([("dataDate", "20110225"), ("stepRange", "6"), ("level", "0")]),
            Err(GribError::Selection { .. })
        ));
        assert!(index.selection().is_none());
    }

    #[test]
    fn rejected_selection_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.grib", &["0", "6"]);
        let codec = Arc::new(NativeCodec::new());
        let mut index = build(&codec, &path);

        index
            .select([("dataDate", Value::Long(20110225)), ("stepRange", Value::from("6"))])
            .unwrap();
        assert!(matches!(
            index.select([("dataDate", "20110225"), ("stepRange", "99")]),
            Err(GribError::Selection { .. })
        ));
        assert_eq!(
            index.selection().unwrap().get("stepRange"),
            Some(&Value::from("6"))
        );

        let msg = index.select_message().unwrap();
        assert_eq!(msg.get_string("stepRange").unwrap(), "6");
        assert!(matches!(
            index.select_message(),
            Err(GribError::Selection { .. })
        ));
    }

    #[test]
    fn size_of_unindexed_key_is_key_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.grib", &["0"]);
        let codec = Arc::new(NativeCodec::new());
        let index = build(&codec, &path);

        assert_eq!(index.size("stepRange").unwrap(), 1);
        assert!(matches!(
            index.size("shortName"),
            Err(GribError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn close_releases_index_and_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.grib", &["0", "0"]);
        let codec = Arc::new(NativeCodec::new());
        let mut index = build(&codec, &path);

        index
            .select([("dataDate", "20110225"), ("stepRange", "0")])
            .unwrap();
        let first = index.select_message().unwrap();
        let second = index.select_message().unwrap();
        assert_eq!(index.open_message_count(), 2);
        assert_eq!(first.owner_kind(), Some(OwnerKind::Index));

        index.close().unwrap();
        index.close().unwrap();
        assert!(!first.is_open());
        assert!(!second.is_open());
        assert_eq!(codec.live_records(), 0);
        assert_eq!(codec.live_indexes(), 0);
        assert!(matches!(
            index.size("stepRange"),
            Err(GribError::UseAfterClose {
                kind: HandleKind::Index
            })
        ));
    }

    #[test]
    fn index_owned_message_cannot_write_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.grib", &["0"]);
        let codec = Arc::new(NativeCodec::new());
        let mut index = build(&codec, &path);

        index
            .select([("dataDate", "20110225"), ("stepRange", "0")])
            .unwrap();
        let msg = index.select_message().unwrap();
        assert!(matches!(msg.write(None), Err(GribError::Resource { .. })));
    }
}
