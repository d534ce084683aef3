//! Encoding and decoding of the fixed-size record header.
//!
//! A record on disk is a 12-byte header followed by the key bytes and,
//! unless the record is a tombstone, the value bytes:
//!
//! ```text
//! offset 0:  u32 little-endian  timestamp (seconds since epoch)
//! offset 4:  u32 little-endian  key_size   (bytes)
//! offset 8:  u32 little-endian  value_size (bytes; 0 = tombstone)
//! offset 12: key_size bytes     key (UTF-8)
//! offset 12+key_size: value_size bytes value (absent if tombstone)
//! ```

use crate::error::{Error, Result};

/// Size in bytes of an encoded header.
pub const HEADER_SIZE: usize = 12;

/// `value_size` reserved to mark a tombstone (deleted key) record.
pub const TOMBSTONE: u32 = 0;

/// A decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub timestamp: u32,
    pub key_size: u32,
    pub value_size: u32,
}

impl Header {
    pub fn new(timestamp: u32, key_size: u32, value_size: u32) -> Self {
        Self { timestamp, key_size, value_size }
    }

    /// Whether this header marks a tombstone record.
    pub fn is_tombstone(&self) -> bool {
        self.value_size == TOMBSTONE
    }
}

/// Encodes a header into its 12-byte on-disk form.
pub fn encode_header(header: Header) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(&header.timestamp.to_le_bytes());
    buf[4..8].copy_from_slice(&header.key_size.to_le_bytes());
    buf[8..12].copy_from_slice(&header.value_size.to_le_bytes());
    buf
}

/// Decodes a 12-byte buffer into a header. Fails only if the buffer is the
/// wrong length; the decoded fields themselves are never invalid since
/// every `u32` bit pattern is a legal timestamp/size.
pub fn decode_header(buf: &[u8]) -> Result<Header> {
    if buf.len() != HEADER_SIZE {
        return Err(Error::Corruption(format!(
            "expected a {HEADER_SIZE}-byte header, got {} bytes",
            buf.len()
        )));
    }
    let timestamp = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let key_size = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    let value_size = u32::from_le_bytes(buf[8..12].try_into().unwrap());
    Ok(Header::new(timestamp, key_size, value_size))
}
