//! Byte-level encoding primitives shared by every packed resource.
//!
//! Conventions: integers are little-endian fixed width, strings are a u16
//! length prefix followed by raw UTF-8 bytes, blobs are a u32 length prefix
//! followed by raw bytes, aggregates emit their fields in declared order
//! with no padding.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("malformed resource data: {0}")]
    BadFormat(String),
    #[error("unsupported resource format version {0}")]
    UnsupportedVersion(u16),
    #[error("unexpected end of resource data")]
    Truncated,
    #[error("corrupt compressed payload: {0}")]
    CorruptPayload(String),
    #[error("resource '{0}' not found")]
    NotFound(String),
    #[error("resource i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only encoder over a growable byte buffer.
#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// u16 length prefix + UTF-8 bytes. Lengths above u16::MAX are a caller
    /// bug and are reported as `BadFormat`.
    pub fn put_string(&mut self, value: &str) -> Result<(), ResourceError> {
        let bytes = value.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(ResourceError::BadFormat(format!(
                "string of {} bytes exceeds u16 length prefix",
                bytes.len()
            )));
        }
        self.put_u16(bytes.len() as u16);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// u32 length prefix + raw bytes.
    pub fn put_blob(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// Raw bytes with no prefix (magic numbers, reserved padding).
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor-based decoder; every read advances and a short buffer yields
/// `Truncated`.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ResourceError> {
        let end = self.cursor.saturating_add(len);
        if end > self.bytes.len() {
            return Err(ResourceError::Truncated);
        }
        let out = &self.bytes[self.cursor..end];
        self.cursor = end;
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, ResourceError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16, ResourceError> {
        let raw = self.take(2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32, ResourceError> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn get_i32(&mut self) -> Result<i32, ResourceError> {
        let raw = self.take(4)?;
        Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn get_string(&mut self) -> Result<String, ResourceError> {
        let len = self.get_u16()? as usize;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| ResourceError::BadFormat("invalid UTF-8 in string".into()))
    }

    pub fn get_blob(&mut self) -> Result<Vec<u8>, ResourceError> {
        let len = self.get_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}
