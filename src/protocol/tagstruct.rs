//! Tagged-value field encoding
//!
//! Extension requests and replies are sequences of self-describing fields.
//! Each field starts with a one-byte tag:
//!
//! ```text
//! 't' - String (UTF-8, NUL-terminated)
//! 'N' - Null string
//! 'L' - Unsigned 32-bit integer (big-endian)
//! '1' - Boolean true
//! '0' - Boolean false
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::ProtocolError;

const TAG_STRING: u8 = b't';
const TAG_STRING_NULL: u8 = b'N';
const TAG_U32: u8 = b'L';
const TAG_BOOLEAN_TRUE: u8 = b'1';
const TAG_BOOLEAN_FALSE: u8 = b'0';

/// A single decoded field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    /// String, `None` for the null string
    String(Option<String>),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Boolean
    Boolean(bool),
}

impl TagValue {
    /// Human-readable type name, used in errors
    pub fn type_name(&self) -> &'static str {
        match self {
            TagValue::String(_) => "string",
            TagValue::U32(_) => "u32",
            TagValue::Boolean(_) => "boolean",
        }
    }
}

/// Field reader over a received payload
#[derive(Debug, Clone)]
pub struct TagStructReader {
    buf: Bytes,
}

impl TagStructReader {
    /// Wrap a payload
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Whether every field has been consumed
    pub fn eof(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Fail if any fields remain
    pub fn expect_eof(&self) -> Result<(), ProtocolError> {
        if self.eof() {
            Ok(())
        } else {
            Err(ProtocolError::TrailingData(self.buf.remaining()))
        }
    }

    /// Decode the next field, whatever its type
    pub fn read(&mut self) -> Result<TagValue, ProtocolError> {
        if self.buf.is_empty() {
            return Err(ProtocolError::UnexpectedEof);
        }

        match self.buf.get_u8() {
            TAG_STRING => self.read_cstring().map(|s| TagValue::String(Some(s))),
            TAG_STRING_NULL => Ok(TagValue::String(None)),
            TAG_U32 => {
                if self.buf.remaining() < 4 {
                    return Err(ProtocolError::UnexpectedEof);
                }
                Ok(TagValue::U32(self.buf.get_u32()))
            }
            TAG_BOOLEAN_TRUE => Ok(TagValue::Boolean(true)),
            TAG_BOOLEAN_FALSE => Ok(TagValue::Boolean(false)),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }

    /// Decode a `u32` field
    pub fn get_u32(&mut self) -> Result<u32, ProtocolError> {
        match self.read()? {
            TagValue::U32(v) => Ok(v),
            other => Err(ProtocolError::TypeMismatch {
                expected: "u32",
                found: other.type_name(),
            }),
        }
    }

    /// Decode a string field; `None` is the null string
    pub fn get_string(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.read()? {
            TagValue::String(s) => Ok(s),
            other => Err(ProtocolError::TypeMismatch {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    /// Decode a boolean field
    pub fn get_boolean(&mut self) -> Result<bool, ProtocolError> {
        match self.read()? {
            TagValue::Boolean(b) => Ok(b),
            other => Err(ProtocolError::TypeMismatch {
                expected: "boolean",
                found: other.type_name(),
            }),
        }
    }

    fn read_cstring(&mut self) -> Result<String, ProtocolError> {
        let nul = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::UnexpectedEof)?;

        let bytes = self.buf.split_to(nul);
        self.buf.advance(1);
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

/// Field writer for replies and notifications
#[derive(Debug, Default)]
pub struct TagStructWriter {
    buf: BytesMut,
}

impl TagStructWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
        }
    }

    /// Get the encoded bytes and reset the writer
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Current encoded length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a single field
    pub fn put(&mut self, value: &TagValue) -> &mut Self {
        match value {
            TagValue::String(s) => self.put_string(s.as_deref()),
            TagValue::U32(v) => self.put_u32(*v),
            TagValue::Boolean(b) => self.put_boolean(*b),
        }
    }

    /// Encode a `u32` field
    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u8(TAG_U32);
        self.buf.put_u32(value);
        self
    }

    /// Encode a string field; interior NULs truncate the string
    pub fn put_string(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(s) => {
                let s = s.split('\0').next().unwrap_or_default();
                self.buf.put_u8(TAG_STRING);
                self.buf.put_slice(s.as_bytes());
                self.buf.put_u8(0);
            }
            None => self.buf.put_u8(TAG_STRING_NULL),
        }
        self
    }

    /// Encode a boolean field
    pub fn put_boolean(&mut self, value: bool) -> &mut Self {
        self.buf
            .put_u8(if value { TAG_BOOLEAN_TRUE } else { TAG_BOOLEAN_FALSE });
        self
    }
}
