//! Owner-side bookkeeping of the messages a container or index produced.
//!
//! Each owner holds one [`Registry`] behind an `Arc<Mutex<_>>`. Messages
//! keep a clone of that `Arc` plus their [`MessageId`]; the record handle
//! itself lives only in the registry slot. Closing the owner drains every
//! slot, so a message whose slot is gone can no longer reach a handle and
//! reports use-after-close on its next call.

use gribkit_codec::RecordHandle;
use gribkit_storage::StorageBackend;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// The container file a registry's messages write back to.
pub(crate) type SharedSink = Arc<Mutex<Box<dyn StorageBackend>>>;

/// A registry shared between an owner and the messages it produced.
pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

/// Identifies a message among the messages of its owner.
///
/// Ids are assigned in production order and never reused by the same
/// owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    /// Returns the raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message#{}", self.0)
    }
}

/// What kind of handle owns a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    /// The message was read from a [`crate::Container`].
    Container,
    /// The message was produced by an [`crate::Index`] selection.
    Index,
}

pub(crate) struct Registry {
    kind: OwnerKind,
    sink: Option<SharedSink>,
    slots: Vec<(MessageId, RecordHandle)>,
    next_id: u64,
    closed: bool,
}

impl Registry {
    pub(crate) fn shared(kind: OwnerKind, sink: Option<SharedSink>) -> SharedRegistry {
        Arc::new(Mutex::new(Self {
            kind,
            sink,
            slots: Vec::new(),
            next_id: 1,
            closed: false,
        }))
    }

    pub(crate) fn kind(&self) -> OwnerKind {
        self.kind
    }

    /// Adds a handle and returns the id its message is known by.
    pub(crate) fn register(&mut self, handle: RecordHandle) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.slots.push((id, handle));
        id
    }

    /// The handle still registered under `id`.
    pub(crate) fn handle_of(&self, id: MessageId) -> Option<RecordHandle> {
        self.slots
            .iter()
            .find(|(slot, _)| *slot == id)
            .map(|(_, handle)| *handle)
    }

    /// Removes `id`, handing its record handle back for release.
    pub(crate) fn deregister(&mut self, id: MessageId) -> Option<RecordHandle> {
        let pos = self.slots.iter().position(|(slot, _)| *slot == id)?;
        Some(self.slots.remove(pos).1)
    }

    /// Empties the registry for good, newest handle first.
    pub(crate) fn drain(&mut self) -> Vec<RecordHandle> {
        self.closed = true;
        self.sink = None;
        self.slots.drain(..).rev().map(|(_, handle)| handle).collect()
    }

    pub(crate) fn ids(&self) -> Vec<MessageId> {
        self.slots.iter().map(|(id, _)| *id).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn sink(&self) -> Option<SharedSink> {
        self.sink.clone()
    }
}
