//! Extension protocol error types
//!
//! Any of these fails the whole request; no partial reply is sent.

use crate::store::{DeviceKey, StoreError};

/// Error type for extension requests
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Payload ended in the middle of a field
    #[error("unexpected end of request")]
    UnexpectedEof,

    /// Field tag is not recognized
    #[error("unknown field tag {0:#04x}")]
    UnknownTag(u8),

    /// Field has a different type than the request requires
    #[error("expected {expected} field, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// String field is not valid UTF-8
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    /// Fields left over after a complete request
    #[error("{0} trailing bytes after request")]
    TrailingData(usize),

    /// Sub-command number is not recognized
    #[error("unknown sub-command {0}")]
    UnknownCommand(u32),

    /// Required string field is null
    #[error("missing {0}")]
    MissingField(&'static str),

    /// Required string field is empty
    #[error("empty {0}")]
    EmptyField(&'static str),

    /// Device key has no known kind prefix
    #[error("invalid device key '{0}'")]
    InvalidKey(String),

    /// Role name has no priority slot
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    /// Referenced device has no (valid) entry
    #[error("no entry in database for device {0}")]
    NoEntry(DeviceKey),

    /// Backing store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}
