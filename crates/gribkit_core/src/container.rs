//! Container handles.

use crate::error::{GribError, GribResult, HandleKind};
use crate::message::Message;
use crate::registry::{MessageId, OwnerKind, Registry, SharedRegistry, SharedSink};
use gribkit_codec::Codec;
use gribkit_storage::StorageBackend;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A sequence of encoded messages, read front to back.
///
/// Iterating a container yields each message once, in file order. Every
/// message produced stays registered with the container until it is
/// closed; closing the container closes all of them.
///
/// # Example
///
/// ```no_run
/// use gribkit_core::Container;
///
/// let mut container = Container::open("forecast.grib2")?;
/// for message in &mut container {
///     let message = message?;
///     println!("{}", message.get_string("stepRange")?);
/// }
/// container.close()?;
/// # Ok::<(), gribkit_core::GribError>(())
/// ```
pub struct Container {
    codec: Arc<dyn Codec>,
    path: Option<PathBuf>,
    file: Option<SharedSink>,
    registry: SharedRegistry,
    offset: u64,
    len: usize,
    messages_read: usize,
    exhausted: bool,
}

impl Container {
    /// Opens a container file read-only with a default
    /// [`Context`](crate::Context).
    ///
    /// # Errors
    ///
    /// Returns [`GribError::Resource`] if the file cannot be opened or is
    /// not a valid container.
    pub fn open(path: impl AsRef<Path>) -> GribResult<Self> {
        crate::Context::default().open_container(path)
    }

    pub(crate) fn from_backend(
        codec: Arc<dyn Codec>,
        file: Box<dyn StorageBackend>,
        path: Option<PathBuf>,
    ) -> GribResult<Self> {
        let len = codec.count_in_file(&*file)?;
        let file: SharedSink = Arc::new(Mutex::new(file));
        let registry = Registry::shared(OwnerKind::Container, Some(Arc::clone(&file)));
        debug!(path = ?path, messages = len, "container opened");
        Ok(Self {
            codec,
            path,
            file: Some(file),
            registry,
            offset: 0,
            len,
            messages_read: 0,
            exhausted: false,
        })
    }

    /// Reads the next message, or `Ok(None)` once every message has been
    /// read.
    ///
    /// Only the messages present at open time are yielded. Frames written
    /// back into the container while iterating are not revisited.
    pub fn next_message(&mut self) -> GribResult<Option<Message>> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| GribError::use_after_close(HandleKind::Container))?;
        if self.messages_read >= self.len {
            return Ok(None);
        }

        let opened = {
            let store = file.lock();
            self.codec.new_handle_from_file(&**store, self.offset)?
        };
        let Some((handle, next)) = opened else {
            return Ok(None);
        };

        self.offset = next;
        self.messages_read += 1;
        Message::owned(Arc::clone(&self.codec), &self.registry, handle).map(Some)
    }

    /// Number of messages the container held when it was opened.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the container held no messages when it was opened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of messages read so far.
    #[must_use]
    pub fn messages_read(&self) -> usize {
        self.messages_read
    }

    /// The file the container was opened from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the container can still be used.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Number of messages produced by this container that are still open.
    #[must_use]
    pub fn open_message_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Ids of the messages produced by this container that are still open,
    /// oldest first.
    #[must_use]
    pub fn open_message_ids(&self) -> Vec<MessageId> {
        self.registry.lock().ids()
    }

    /// Closes every open message, then the container itself.
    ///
    /// Closing an already closed container does nothing. All handles are
    /// released even when one release fails; the first failure is
    /// returned.
    pub fn close(&mut self) -> GribResult<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let handles = self.registry.lock().drain();
        let released = handles.len();
        let mut first_err: Option<GribError> = None;
        for handle in handles {
            if let Err(e) = self.codec.release_handle(handle) {
                first_err.get_or_insert(e.into());
            }
        }
        if let Err(e) = file.lock().flush() {
            first_err.get_or_insert(e.into());
        }

        debug!(path = ?self.path, released, "container closed");
        first_err.map_or(Ok(()), Err)
    }
}

impl Iterator for Container {
    type Item = GribResult<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let item = self.next_message().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.exhausted = true;
        }
        item
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, path = ?self.path, "failed to close container on drop");
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("messages_read", &self.messages_read)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
