//! Error types for the device manager
//!
//! Nothing here is fatal to the host: every failure degrades to a no-op for
//! the request or event that caused it, plus a log line.

use std::io;

use crate::protocol::ProtocolError;
use crate::store::StoreError;

/// Crate-level result type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure, typically opening or syncing the database
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration or module arguments
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Priority store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Extension request failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The manager service has stopped
    #[error("device manager service is not running")]
    ServiceClosed,
}

/// Module argument errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Argument is not of the form `key=value`
    #[error("malformed argument '{0}'")]
    Malformed(String),

    /// Argument key is not recognized
    #[error("unknown argument '{0}'")]
    UnknownArgument(String),

    /// Argument value is not a boolean
    #[error("{key}= expects a boolean argument, got '{value}'")]
    InvalidBoolean { key: String, value: String },
}
