//! Wire framing of records inside a container.
//!
//! ## Format
//!
//! ```text
//! Frame {
//!     magic: "GRIB"
//!     length: u32 (big-endian, whole frame including magic and trailer)
//!     body: CBOR-encoded Record
//!     trailer: "7777"
//! }
//! ```
//!
//! A container is a plain concatenation of frames. An empty store is a
//! valid container with no records.

use crate::error::{CodecError, CodecResult};
use crate::record::Record;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use gribkit_storage::StorageBackend;

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"GRIB";

/// Magic bytes closing every frame.
pub const FRAME_TRAILER: [u8; 4] = *b"7777";

const HEADER_LEN: usize = 8;

/// Bytes a frame adds around its body.
pub const FRAME_OVERHEAD: usize = HEADER_LEN + FRAME_TRAILER.len();

/// Position of one frame inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLocation {
    /// Offset of the frame's magic.
    pub offset: u64,
    /// Total frame length in bytes.
    pub length: u32,
}

impl FrameLocation {
    /// Offset just past this frame.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.length)
    }
}

/// Encodes a record into a complete frame.
///
/// # Errors
///
/// Returns an error if the body cannot be encoded or exceeds `u32::MAX`.
pub fn encode_frame(record: &Record) -> CodecResult<Bytes> {
    let mut body = Vec::new();
    ciborium::into_writer(record, &mut body).map_err(|e| CodecError::Encoding {
        message: e.to_string(),
    })?;

    let total = body.len() + FRAME_OVERHEAD;
    let length = u32::try_from(total).map_err(|_| CodecError::Encoding {
        message: format!("record of {total} bytes does not fit a frame"),
    })?;

    let mut buf = BytesMut::with_capacity(total);
    buf.put_slice(&FRAME_MAGIC);
    buf.put_u32(length);
    buf.put_slice(&body);
    buf.put_slice(&FRAME_TRAILER);
    Ok(buf.freeze())
}

/// Decodes a complete frame.
///
/// # Errors
///
/// Returns [`CodecError::Corrupt`] for bad magic, length or trailer, and
/// [`CodecError::Decoding`] if the body is not a valid record.
pub fn decode_frame(bytes: &[u8]) -> CodecResult<Record> {
    if bytes.len() < FRAME_OVERHEAD {
        return Err(CodecError::corrupt("frame too small"));
    }
    let mut header = &bytes[..HEADER_LEN];
    if header[..4] != FRAME_MAGIC {
        return Err(CodecError::corrupt("invalid frame magic"));
    }
    header.advance(4);
    let declared = header.get_u32() as usize;
    if declared != bytes.len() {
        return Err(CodecError::corrupt(format!(
            "frame declares {declared} bytes, got {}",
            bytes.len()
        )));
    }
    let body_end = bytes.len() - FRAME_TRAILER.len();
    if bytes[body_end..] != FRAME_TRAILER {
        return Err(CodecError::corrupt("missing frame trailer"));
    }

    ciborium::from_reader(&bytes[HEADER_LEN..body_end]).map_err(|e| CodecError::Decoding {
        message: e.to_string(),
    })
}

/// Locates the frame starting at `offset` without decoding its body.
///
/// Returns `Ok(None)` when `offset` is at the end of the store.
///
/// # Errors
///
/// Returns [`CodecError::Corrupt`] if the bytes at `offset` are not a
/// complete frame no longer than `max_len`.
pub fn locate_frame(
    store: &dyn StorageBackend,
    offset: u64,
    max_len: u32,
) -> CodecResult<Option<FrameLocation>> {
    let size = store.size()?;
    if offset >= size {
        return Ok(None);
    }
    if size - offset < HEADER_LEN as u64 {
        return Err(CodecError::corrupt(format!(
            "truncated frame header at offset {offset}"
        )));
    }

    let header = store.read_at(offset, HEADER_LEN)?;
    if header[..4] != FRAME_MAGIC {
        return Err(CodecError::corrupt(format!(
            "invalid frame magic at offset {offset}"
        )));
    }
    let mut len_bytes = &header[4..];
    let length = len_bytes.get_u32();

    if (length as usize) < FRAME_OVERHEAD || length > max_len {
        return Err(CodecError::corrupt(format!(
            "invalid frame length {length} at offset {offset}"
        )));
    }
    let location = FrameLocation { offset, length };
    if location.end() > size {
        return Err(CodecError::corrupt(format!(
            "truncated frame at offset {offset}"
        )));
    }

    let trailer_at = location.end() - FRAME_TRAILER.len() as u64;
    if store.read_at(trailer_at, FRAME_TRAILER.len())? != FRAME_TRAILER {
        return Err(CodecError::corrupt(format!(
            "missing frame trailer at offset {trailer_at}"
        )));
    }
    Ok(Some(location))
}

/// Reads and decodes the frame starting at `offset`.
///
/// # Errors
///
/// See [`locate_frame`] and [`decode_frame`].
pub fn read_frame(
    store: &dyn StorageBackend,
    offset: u64,
    max_len: u32,
) -> CodecResult<Option<(Record, FrameLocation)>> {
    let Some(location) = locate_frame(store, offset, max_len)? else {
        return Ok(None);
    };
    let bytes = store.read_at(location.offset, location.length as usize)?;
    Ok(Some((decode_frame(&bytes)?, location)))
}

/// Walks every frame in the store.
///
/// # Errors
///
/// Fails on the first frame that does not validate.
pub fn scan_frames(store: &dyn StorageBackend, max_len: u32) -> CodecResult<Vec<FrameLocation>> {
    let mut frames = Vec::new();
    let mut offset = 0;
    while let Some(location) = locate_frame(store, offset, max_len)? {
        offset = location.end();
        frames.push(location);
    }
    Ok(frames)
}
