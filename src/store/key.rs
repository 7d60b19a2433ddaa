//! Database key types
//!
//! Every persisted entry is keyed by `"<kind>:<device-name>"`. The prefix
//! alone decides which device space (sinks or sources) a key belongs to.

use std::fmt;

/// Kind of audio device an entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceKind {
    /// Output device
    Sink,
    /// Input device
    Source,
}

impl DeviceKind {
    /// Both kinds, sinks first
    pub const ALL: [DeviceKind; 2] = [DeviceKind::Sink, DeviceKind::Source];

    /// Key prefix for this kind, including the separator
    pub fn prefix(self) -> &'static str {
        match self {
            DeviceKind::Sink => "sink:",
            DeviceKind::Source => "source:",
        }
    }

    /// Human-readable name, used in log output
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Sink => "sink",
            DeviceKind::Source => "source",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of a persisted device entry (kind + device name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey {
    kind: DeviceKind,
    name: String,
}

impl DeviceKey {
    /// Create a new key
    pub fn new(kind: DeviceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Key for a sink
    pub fn sink(name: impl Into<String>) -> Self {
        Self::new(DeviceKind::Sink, name)
    }

    /// Key for a source
    pub fn source(name: impl Into<String>) -> Self {
        Self::new(DeviceKind::Source, name)
    }

    /// Parse a raw database key
    ///
    /// Returns `None` when the key carries neither prefix, or when the name
    /// after the prefix is empty.
    pub fn parse(raw: &str) -> Option<Self> {
        DeviceKind::ALL.into_iter().find_map(|kind| {
            raw.strip_prefix(kind.prefix())
                .filter(|name| !name.is_empty())
                .map(|name| Self::new(kind, name))
        })
    }

    /// Parse raw key bytes as stored in the database
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        std::str::from_utf8(raw).ok().and_then(Self::parse)
    }

    /// Device kind
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Device name without the prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encoded form used as the database key
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.name)
    }
}
