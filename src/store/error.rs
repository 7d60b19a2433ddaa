//! Store error types

use super::key::DeviceKey;

/// Reason a persisted record was rejected
///
/// Every variant is treated as "entry absent" by the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Record size does not match the current layout
    #[error("wrong size {actual} != {expected}")]
    WrongSize { actual: usize, expected: usize },
    /// Record was written by another format version
    #[error("version {found} doesn't match {expected}")]
    VersionMismatch { found: u8, expected: u8 },
    /// Description field has no terminating NUL
    #[error("missing NUL byte in description")]
    MissingNul,
    /// Description is not valid UTF-8
    #[error("description is not valid UTF-8")]
    InvalidUtf8,
}

/// Error type for priority store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Replace-only write against a key with no entry
    #[error("no entry for device {0}")]
    NotFound(DeviceKey),
    /// Backing database failure
    #[error("database error: {0}")]
    Database(#[from] std::io::Error),
}
