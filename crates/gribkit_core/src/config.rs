//! Context configuration.

use gribkit_codec::DEFAULT_MAX_MESSAGE_SIZE;
use std::path::PathBuf;

/// Configuration for a [`crate::Context`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Open containers read/write, so messages can be appended back to
    /// the container they were read from.
    pub writable: bool,

    /// Directory searched for `<name>.tmpl` samples before the built-in
    /// ones.
    pub samples_path: Option<PathBuf>,

    /// Largest frame accepted when reading containers; anything bigger is
    /// treated as corruption.
    pub max_message_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            writable: false,
            samples_path: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether containers are opened read/write.
    #[must_use]
    pub const fn writable(mut self, value: bool) -> Self {
        self.writable = value;
        self
    }

    /// Sets the sample directory.
    #[must_use]
    pub fn samples_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.samples_path = Some(path.into());
        self
    }

    /// Sets the largest accepted frame.
    #[must_use]
    pub const fn max_message_size(mut self, size: u32) -> Self {
        self.max_message_size = size;
        self
    }
}
