//! Message handles.
//!
//! A [`Message`] is one decoded record. It is either owned by the
//! [`Container`](crate::Container) or [`Index`](crate::Index) that
//! produced it, in which case its record handle lives in the owner's
//! registry, or standalone (built from a sample or cloned), in which case
//! it holds the handle itself.

use crate::error::{GribError, GribResult, HandleKind};
use crate::registry::{MessageId, OwnerKind, SharedRegistry};
use bytes::Bytes;
use gribkit_codec::{
    Codec, CodecError, KeyIterHandle, NativeType, RecordHandle, Value, VALUES_KEY,
};
use gribkit_storage::StorageBackend;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

enum Binding {
    Owned { registry: SharedRegistry, id: MessageId },
    Standalone { handle: Option<RecordHandle> },
}

/// One decoded record.
///
/// Every operation fails with [`GribError::UseAfterClose`] once the
/// message, or the container or index that owns it, has been closed.
/// Dropping a message closes it.
pub struct Message {
    codec: Arc<dyn Codec>,
    binding: Binding,
    size: usize,
}

impl Message {
    /// Creates a standalone message from a built-in sample, using a default
    /// [`Context`](crate::Context).
    ///
    /// # Errors
    ///
    /// Returns [`GribError::Resource`] if no sample has that name.
    pub fn from_sample(name: &str) -> GribResult<Self> {
        crate::Context::default().message_from_sample(name)
    }

    /// Wraps a handle produced by an owner and registers it there.
    pub(crate) fn owned(
        codec: Arc<dyn Codec>,
        registry: &SharedRegistry,
        handle: RecordHandle,
    ) -> GribResult<Self> {
        let size = byte_size_or_release(codec.as_ref(), handle)?;
        let id = {
            let mut reg = registry.lock();
            if reg.is_closed() {
                let kind = match reg.kind() {
                    OwnerKind::Container => HandleKind::Container,
                    OwnerKind::Index => HandleKind::Index,
                };
                drop(reg);
                release_quietly(codec.as_ref(), handle);
                return Err(GribError::use_after_close(kind));
            }
            reg.register(handle)
        };
        trace!(%id, %handle, "message registered");
        Ok(Self {
            codec,
            binding: Binding::Owned {
                registry: Arc::clone(registry),
                id,
            },
            size,
        })
    }

    /// Wraps a handle that no container or index owns.
    pub(crate) fn standalone(codec: Arc<dyn Codec>, handle: RecordHandle) -> GribResult<Self> {
        let size = byte_size_or_release(codec.as_ref(), handle)?;
        Ok(Self {
            codec,
            binding: Binding::Standalone {
                handle: Some(handle),
            },
            size,
        })
    }

    fn handle(&self) -> GribResult<RecordHandle> {
        let handle = match &self.binding {
            Binding::Owned { registry, id } => registry.lock().handle_of(*id),
            Binding::Standalone { handle } => *handle,
        };
        handle.ok_or_else(|| GribError::use_after_close(HandleKind::Message))
    }

    /// Whether the message can still be used.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle().is_ok()
    }

    /// The id of the message within its owner, if it has one.
    #[must_use]
    pub fn id(&self) -> Option<MessageId> {
        match &self.binding {
            Binding::Owned { id, .. } => Some(*id),
            Binding::Standalone { .. } => None,
        }
    }

    /// The kind of handle that owns the message, if any.
    #[must_use]
    pub fn owner_kind(&self) -> Option<OwnerKind> {
        match &self.binding {
            Binding::Owned { registry, .. } => Some(registry.lock().kind()),
            Binding::Standalone { .. } => None,
        }
    }

    /// Size of the encoded message in bytes, as it was when the message
    /// was created.
    pub fn size(&self) -> GribResult<usize> {
        self.handle()?;
        Ok(self.size)
    }

    /// Names of the keys in the message, optionally restricted to one
    /// namespace.
    pub fn keys(&self, namespace: Option<&str>) -> GribResult<Vec<String>> {
        let handle = self.handle()?;
        let cursor = KeyCursor {
            codec: self.codec.as_ref(),
            iter: self.codec.new_key_iterator(handle, namespace)?,
        };

        let mut names = Vec::new();
        while self.codec.advance(cursor.iter)? {
            names.push(self.codec.current_name(cursor.iter)?);
        }
        Ok(names)
    }

    /// Whether the message has `key`.
    pub fn contains(&self, key: &str) -> GribResult<bool> {
        Ok(self.keys(None)?.iter().any(|name| name == key))
    }

    /// Number of keys in the message.
    pub fn key_count(&self) -> GribResult<usize> {
        Ok(self.keys(None)?.len())
    }

    /// Reads a key.
    ///
    /// `values` is always read as a double array. Any other key is read as
    /// a scalar first and as an array when it holds one, so a one-element
    /// array comes back as an array.
    ///
    /// # Errors
    ///
    /// - [`GribError::MissingKey`] if the key is marked missing
    /// - [`GribError::KeyNotFound`] if the message has no such key
    pub fn get(&self, key: &str, ty: Option<NativeType>) -> GribResult<Value> {
        let handle = self.handle()?;
        if self.codec.is_missing(handle, key)? {
            return Err(GribError::MissingKey {
                key: key.to_string(),
            });
        }
        if key == VALUES_KEY {
            return Ok(self.codec.get_array(handle, key, Some(NativeType::Double))?);
        }

        match self.codec.get_scalar(handle, key, ty) {
            Err(CodecError::ArrayTooSmall { len, .. }) => {
                trace!(key, len, "reading key as array");
                Ok(self.codec.get_array(handle, key, ty)?)
            }
            other => Ok(other?),
        }
    }

    /// Reads a key as an integer. A one-element array yields its element.
    pub fn get_long(&self, key: &str) -> GribResult<i64> {
        let value = self.get(key, Some(NativeType::Long))?;
        match (value.as_long(), value.as_long_array()) {
            (Some(n), _) | (None, Some(&[n])) => Ok(n),
            _ => Err(CodecError::type_mismatch(key, "not an integer").into()),
        }
    }

    /// Reads a key as a float. A one-element array yields its element.
    pub fn get_double(&self, key: &str) -> GribResult<f64> {
        let value = self.get(key, Some(NativeType::Double))?;
        match (value.as_double(), value.as_double_array()) {
            (Some(x), _) | (None, Some(&[x])) => Ok(x),
            _ => Err(CodecError::type_mismatch(key, "not a float").into()),
        }
    }

    /// Reads a key as text.
    pub fn get_string(&self, key: &str) -> GribResult<String> {
        match self.get(key, Some(NativeType::Text))? {
            Value::Text(text) => Ok(text),
            other => Ok(other.to_text()),
        }
    }

    /// Every key with its value, in key order. Missing keys map to `None`.
    pub fn items(&self) -> GribResult<Vec<(String, Option<Value>)>> {
        self.keys(None)?
            .into_iter()
            .map(|key| match self.get(&key, None) {
                Ok(value) => Ok((key, Some(value))),
                Err(GribError::MissingKey { .. }) => Ok((key, None)),
                Err(e) => Err(e),
            })
            .collect()
    }

    /// Writes a key. Array values are written as arrays, everything else as
    /// a scalar.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> GribResult<()> {
        let handle = self.handle()?;
        let value = value.into();
        if value.is_array() {
            self.codec.set_array(handle, key, &value)?;
        } else {
            self.codec.set_scalar(handle, key, &value)?;
        }
        Ok(())
    }

    /// Whether `key` is marked missing.
    pub fn missing(&self, key: &str) -> GribResult<bool> {
        let handle = self.handle()?;
        Ok(self.codec.is_missing(handle, key)?)
    }

    /// Marks `key` missing.
    pub fn set_missing(&mut self, key: &str) -> GribResult<()> {
        let handle = self.handle()?;
        Ok(self.codec.set_missing(handle, key)?)
    }

    /// Appends the encoded message to `destination`, or to the container
    /// it was read from when `destination` is `None`.
    ///
    /// Returns the offset the message was written at.
    ///
    /// # Errors
    ///
    /// Returns [`GribError::Resource`] when `destination` is `None` and the
    /// message has no owning container, or that container is read-only.
    pub fn write(&self, destination: Option<&mut dyn StorageBackend>) -> GribResult<u64> {
        let handle = self.handle()?;
        if let Some(sink) = destination {
            return Ok(self.codec.serialize_to_sink(handle, sink)?);
        }

        let sink = match &self.binding {
            Binding::Owned { registry, .. } => registry.lock().sink(),
            Binding::Standalone { .. } => None,
        };
        let sink = sink.ok_or_else(|| {
            GribError::resource("message has no owning container to write back to")
        })?;
        let mut store = sink.lock();
        Ok(self.codec.serialize_to_sink(handle, &mut **store)?)
    }

    /// The encoded message.
    pub fn dump(&self) -> GribResult<Bytes> {
        let handle = self.handle()?;
        Ok(self.codec.message_bytes(handle)?)
    }

    /// Deep-copies the message. The copy is standalone: closing this
    /// message or its owner does not affect it.
    pub fn try_clone(&self) -> GribResult<Message> {
        let handle = self.handle()?;
        let copy = self.codec.clone_handle(handle)?;
        Message::standalone(Arc::clone(&self.codec), copy)
    }

    /// Releases the message. Closing twice, or after the owner has closed,
    /// does nothing.
    pub fn close(&mut self) -> GribResult<()> {
        let handle = match &mut self.binding {
            Binding::Owned { registry, id } => registry.lock().deregister(*id),
            Binding::Standalone { handle } => handle.take(),
        };
        if let Some(handle) = handle {
            self.codec.release_handle(handle)?;
            trace!(%handle, "message released");
        }
        Ok(())
    }
}

impl Drop for Message {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to release message on drop");
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id())
            .field("owner", &self.owner_kind())
            .field("size", &self.size)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Disposes of a key iterator when the walk ends, early or not.
struct KeyCursor<'a> {
    codec: &'a dyn Codec,
    iter: KeyIterHandle,
}

impl Drop for KeyCursor<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.codec.dispose_iterator(self.iter) {
            warn!(error = %e, iter = %self.iter, "failed to dispose key iterator");
        }
    }
}

fn byte_size_or_release(codec: &dyn Codec, handle: RecordHandle) -> GribResult<usize> {
    match codec.message_byte_size(handle) {
        Ok(size) => Ok(size),
        Err(e) => {
            release_quietly(codec, handle);
            Err(e.into())
        }
    }
}

fn release_quietly(codec: &dyn Codec, handle: RecordHandle) {
    if let Err(e) = codec.release_handle(handle) {
        warn!(error = %e, %handle, "failed to release record handle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gribkit_codec::{NativeCodec, RecordCodec};
    use gribkit_storage::InMemoryBackend;

    fn sample(codec: &Arc<NativeCodec>) -> Message {
        let handle = codec.new_handle_from_sample("GRIB2").unwrap();
        Message::standalone(Arc::clone(codec) as Arc<dyn Codec>, handle).unwrap()
    }

    #[test]
    fn get_falls_back_to_array() {
        let codec = Arc::new(NativeCodec::new());
        let mut msg = sample(&codec);

        msg.set("pv", vec![1.5, 2.5, 3.5]).unwrap();
        assert_eq!(
            msg.get("pv", None).unwrap(),
            Value::DoubleArray(vec![1.5, 2.5, 3.5])
        );
        assert!(matches!(
            msg.set("pl", vec![4i64, 8]),
            Err(GribError::KeyNotFound { .. })
        ));
        assert_eq!(msg.get("Ni", None).unwrap(), Value::Long(2));
    }

    #[test]
    fn values_is_always_an_array() {
        let codec = Arc::new(NativeCodec::new());
        let mut msg = sample(&codec);

        msg.set(VALUES_KEY, vec![5.0]).unwrap();
        assert_eq!(msg.get(VALUES_KEY, None).unwrap(), Value::DoubleArray(vec![5.0]));
        assert_eq!(
            msg.get(VALUES_KEY, Some(NativeType::Long)).unwrap(),
            Value::DoubleArray(vec![5.0])
        );
    }

    #[test]
    fn missing_reads_fail() {
        let codec = Arc::new(NativeCodec::new());
        let mut msg = sample(&codec);

        assert!(matches!(
            msg.get("scaleFactorOfSecondFixedSurface", None),
            Err(GribError::MissingKey { .. })
        ));
        assert!(matches!(
            msg.get("noSuchKey", None),
            Err(GribError::KeyNotFound { .. })
        ));

        msg.set_missing("level").unwrap();
        assert!(msg.missing("level").unwrap());
        let items = msg.items().unwrap();
        assert!(items.iter().any(|(k, v)| k == "level" && v.is_none()));
    }

    #[test]
    fn keys_release_their_iterator() {
        let codec = Arc::new(NativeCodec::new());
        let msg = sample(&codec);

        let all = msg.keys(None).unwrap();
        let ls = msg.keys(Some("ls")).unwrap();
        assert!(ls.len() < all.len());
        assert!(ls.iter().all(|k| all.contains(k)));
        assert!(msg.contains("shortName").unwrap());
        assert_eq!(msg.key_count().unwrap(), all.len());
        assert_eq!(codec.live_iterators(), 0);
    }

    #[test]
    fn typed_getters() {
        let codec = Arc::new(NativeCodec::new());
        let msg = sample(&codec);

        assert_eq!(msg.get_long("dataDate").unwrap(), 20070323);
        assert_eq!(msg.get_double("Ni").unwrap(), 2.0);
        assert_eq!(msg.get_string("shortName").unwrap(), "t");
        assert_eq!(msg.get_string("level").unwrap(), "0");
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let codec = Arc::new(NativeCodec::new());
        let mut msg = sample(&codec);
        assert_eq!(codec.live_records(), 1);

        msg.close().unwrap();
        msg.close().unwrap();
        assert_eq!(codec.live_records(), 0);
        assert!(!msg.is_open());
        assert!(matches!(
            msg.get("shortName", None),
            Err(GribError::UseAfterClose {
                kind: HandleKind::Message
            })
        ));
        assert!(matches!(msg.size(), Err(GribError::UseAfterClose { .. })));
    }

    #[test]
    fn clone_is_independent() {
        let codec = Arc::new(NativeCodec::new());
        let mut msg = sample(&codec);
        let copy = msg.try_clone().unwrap();

        msg.set("shortName", "msl").unwrap();
        assert_eq!(copy.get_string("shortName").unwrap(), "t");

        msg.close().unwrap();
        assert_eq!(copy.get_string("shortName").unwrap(), "t");
        assert!(copy.id().is_none());
        assert!(copy.owner_kind().is_none());
    }

    #[test]
    fn drop_releases_handle() {
        let codec = Arc::new(NativeCodec::new());
        {
            let _msg = sample(&codec);
            assert_eq!(codec.live_records(), 1);
        }
        assert_eq!(codec.live_records(), 0);
    }

    #[test]
    fn write_without_owner_needs_destination() {
        let codec = Arc::new(NativeCodec::new());
        let msg = sample(&codec);

        assert!(matches!(msg.write(None), Err(GribError::Resource { .. })));

        let mut out = InMemoryBackend::new();
        let offset = msg.write(Some(&mut out)).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(out.data(), msg.dump().unwrap().to_vec());
        assert_eq!(msg.size().unwrap(), out.data().len());
    }
}
