//! The entry point that binds a codec to a configuration.

use crate::config::Config;
use crate::container::Container;
use crate::error::GribResult;
use crate::index::Index;
use crate::message::Message;
use gribkit_codec::{Codec, NativeCodec};
use gribkit_storage::{FileBackend, StorageBackend};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Opens containers, indexes and sample messages against one codec.
///
/// Handles created through the same context share its codec. Cloning a
/// context is cheap.
#[derive(Clone)]
pub struct Context {
    codec: Arc<dyn Codec>,
    config: Config,
}

impl Context {
    /// Creates a context backed by a [`NativeCodec`] set up from `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mut codec = NativeCodec::new().with_max_message_size(config.max_message_size);
        if let Some(dir) = &config.samples_path {
            codec = codec.with_samples_path(dir.clone());
        }
        Self {
            codec: Arc::new(codec),
            config,
        }
    }

    /// Creates a context around an existing codec.
    ///
    /// `config.samples_path` and `config.max_message_size` are the codec's
    /// business here and are not applied.
    #[must_use]
    pub fn with_codec(codec: Arc<dyn Codec>, config: Config) -> Self {
        Self { codec, config }
    }

    /// The codec handles are keyed into.
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens a container file, read/write if the context is writable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GribError::Resource`] if the file cannot be opened
    /// or holds a damaged frame.
    pub fn open_container(&self, path: impl AsRef<Path>) -> GribResult<Container> {
        let path = path.as_ref();
        let file: Box<dyn StorageBackend> = if self.config.writable {
            Box::new(FileBackend::open(path)?)
        } else {
            Box::new(FileBackend::open_read_only(path)?)
        };
        Container::from_backend(Arc::clone(&self.codec), file, Some(path.to_path_buf()))
    }

    /// Wraps any byte store as a container.
    pub fn container_from_backend(
        &self,
        backend: Box<dyn StorageBackend>,
    ) -> GribResult<Container> {
        Container::from_backend(Arc::clone(&self.codec), backend, None)
    }

    /// Builds an index over `keys` from a container file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GribError::Resource`] if the file cannot be read,
    /// or [`crate::GribError::Codec`] if `keys` is empty or repeats a key.
    pub fn build_index<S: AsRef<str>>(
        &self,
        path: impl AsRef<Path>,
        keys: &[S],
    ) -> GribResult<Index> {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let handle = self.codec.new_index_from_file(path.as_ref(), &keys)?;
        Ok(Index::from_handle(Arc::clone(&self.codec), handle, Some(keys)))
    }

    /// Loads an index file.
    pub fn load_index(&self, path: impl AsRef<Path>) -> GribResult<Index> {
        let handle = self.codec.read_index(path.as_ref())?;
        Ok(Index::from_handle(Arc::clone(&self.codec), handle, None))
    }

    /// Creates a standalone message from a named sample.
    pub fn message_from_sample(&self, name: &str) -> GribResult<Message> {
        let handle = self.codec.new_handle_from_sample(name)?;
        Message::standalone(Arc::clone(&self.codec), handle)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GribError;
    use std::fs;

    #[test]
    fn unknown_sample_is_resource_error() {
        let ctx = Context::default();
        assert!(matches!(
            ctx.message_from_sample("GRIB0"),
            Err(GribError::Resource { .. })
        ));
        assert!(ctx.message_from_sample("GRIB2").is_ok());
    }

    #[test]
    fn samples_directory_is_searched_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut msg = Message::from_sample("GRIB2").unwrap();
        msg.set("shortName", "msl").unwrap();
        fs::write(dir.path().join("GRIB2.tmpl"), msg.dump().unwrap()).unwrap();

        let ctx = Context::new(Config::new().samples_path(dir.path()));
        let from_dir = ctx.message_from_sample("GRIB2").unwrap();
        assert_eq!(from_dir.get_string("shortName").unwrap(), "msl");
    }

    #[test]
    fn missing_file_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::default();
        assert!(matches!(
            ctx.open_container(dir.path().join("absent.grib")),
            Err(GribError::Resource { .. })
        ));
        assert!(matches!(
            ctx.build_index(dir.path().join("absent.grib"), &["shortName"]),
            Err(GribError::Resource { .. })
        ));
        assert!(matches!(
            ctx.load_index(dir.path().join("absent.idx")),
            Err(GribError::Resource { .. })
        ));
    }

    #[test]
    fn writable_context_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.grib");
        let sample = Message::from_sample("GRIB2").unwrap();
        let mut file = FileBackend::create(&path).unwrap();
        sample.write(Some(&mut file)).unwrap();
        drop(file);

        let ctx = Context::new(Config::new().writable(true));
        let mut container = ctx.open_container(&path).unwrap();
        let msg = container.next_message().unwrap().unwrap();
        let offset = msg.write(None).unwrap();
        assert_eq!(offset, msg.size().unwrap() as u64);
        container.close().unwrap();

        let reopened = ctx.open_container(&path).unwrap();
        assert_eq!(reopened.len(), 2);
    }
}
