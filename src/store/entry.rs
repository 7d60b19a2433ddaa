//! Persisted device entry and its binary layout
//!
//! Record layout (165 bytes):
//! ```text
//! offset  size  field
//! 0       1     version (ENTRY_VERSION)
//! 1       128   description, UTF-8, NUL-terminated and NUL-padded
//! 129     36    priority, 9 x u32 big-endian, indexed by Role
//! ```

use std::fmt;
use std::ops::{Index, IndexMut};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::DecodeError;

/// Current record format version
pub const ENTRY_VERSION: u8 = 1;

/// Size of the description field, including its terminating NUL
pub const DESCRIPTION_MAX: usize = 128;

/// Number of usage roles
pub const NUM_ROLES: usize = 9;

/// Encoded size of an entry record
pub const ENTRY_SIZE: usize = 1 + DESCRIPTION_MAX + NUM_ROLES * 4;

/// Declared usage category of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// No role declared
    None,
    Video,
    Music,
    Game,
    Event,
    Phone,
    Animation,
    Production,
    Accessibility,
}

impl Role {
    /// All roles in slot order
    pub const ALL: [Role; NUM_ROLES] = [
        Role::None,
        Role::Video,
        Role::Music,
        Role::Game,
        Role::Event,
        Role::Phone,
        Role::Animation,
        Role::Production,
        Role::Accessibility,
    ];

    /// Parse a `media.role` property value
    ///
    /// The empty string is the "none" role. Unrecognized strings yield
    /// `None`, meaning the stream expresses no usable preference.
    pub fn parse(role: &str) -> Option<Role> {
        let role = match role {
            "" => Role::None,
            "video" => Role::Video,
            "music" => Role::Music,
            "game" => Role::Game,
            "event" => Role::Event,
            "phone" => Role::Phone,
            "animation" => Role::Animation,
            "production" => Role::Production,
            "a11y" | "accessibility" => Role::Accessibility,
            _ => return None,
        };
        Some(role)
    }

    /// Role for an optional property; a missing property is the "none" role
    pub fn from_property(role: Option<&str>) -> Option<Role> {
        Role::parse(role.unwrap_or(""))
    }

    /// Slot index in the priority vector
    pub fn index(self) -> usize {
        self as usize
    }

    /// Property value for this role
    pub fn as_str(self) -> &'static str {
        match self {
            Role::None => "",
            Role::Video => "video",
            Role::Music => "music",
            Role::Game => "game",
            Role::Event => "event",
            Role::Phone => "phone",
            Role::Animation => "animation",
            Role::Production => "production",
            Role::Accessibility => "a11y",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::None => f.write_str("none"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Per-role rank vector; lower rank means more preferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RolePriorities([u32; NUM_ROLES]);

impl RolePriorities {
    /// Same rank in every role
    pub fn uniform(rank: u32) -> Self {
        Self([rank; NUM_ROLES])
    }

    /// Rank for each role paired with the role
    pub fn iter(&self) -> impl Iterator<Item = (Role, u32)> + '_ {
        Role::ALL.into_iter().zip(self.0.iter().copied())
    }

    /// Element-wise maximum
    pub fn max(&self, other: &RolePriorities) -> RolePriorities {
        let mut out = *self;
        for role in Role::ALL {
            out[role] = out[role].max(other[role]);
        }
        out
    }

    /// One rank past every slot (newcomers rank last)
    pub fn successor(&self) -> RolePriorities {
        let mut out = *self;
        for slot in out.0.iter_mut() {
            *slot = slot.saturating_add(1);
        }
        out
    }
}

impl Index<Role> for RolePriorities {
    type Output = u32;

    fn index(&self, role: Role) -> &u32 {
        &self.0[role.index()]
    }
}

impl IndexMut<Role> for RolePriorities {
    fn index_mut(&mut self, role: Role) -> &mut u32 {
        &mut self.0[role.index()]
    }
}

/// A persisted device entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub description: String,
    /// Per-role ranking among devices of the same kind
    pub priority: RolePriorities,
}

impl Entry {
    /// Create an entry, truncating the description to fit its field
    pub fn new(description: impl Into<String>, priority: RolePriorities) -> Self {
        let description: String = description.into();
        let mut entry = Self {
            description: String::new(),
            priority,
        };
        entry.set_description(&description);
        entry
    }

    /// Replace the description, truncating at a character boundary so it
    /// fits the field with its terminating NUL
    pub fn set_description(&mut self, description: &str) {
        let description = description.split('\0').next().unwrap_or_default();
        let mut end = description.len().min(DESCRIPTION_MAX - 1);
        while !description.is_char_boundary(end) {
            end -= 1;
        }
        self.description = description[..end].to_string();
    }

    /// Entries are equal for change-suppression purposes when their
    /// descriptions match; priorities are ignored.
    pub fn same_description(&self, other: &Entry) -> bool {
        self.description == other.description
    }

    /// Encode the fixed-layout record
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ENTRY_SIZE);
        buf.put_u8(ENTRY_VERSION);

        let description = self.description.as_bytes();
        let len = description.len().min(DESCRIPTION_MAX - 1);
        buf.put_slice(&description[..len]);
        buf.put_bytes(0, DESCRIPTION_MAX - len);

        for (_, rank) in self.priority.iter() {
            buf.put_u32(rank);
        }

        debug_assert_eq!(buf.len(), ENTRY_SIZE);
        buf.freeze()
    }

    /// Decode a record
    ///
    /// Any failure rejects the whole record; no field is salvaged.
    pub fn decode(data: &[u8]) -> Result<Entry, DecodeError> {
        if data.len() != ENTRY_SIZE {
            return Err(DecodeError::WrongSize {
                actual: data.len(),
                expected: ENTRY_SIZE,
            });
        }

        let mut buf = data;
        let version = buf.get_u8();
        if version != ENTRY_VERSION {
            return Err(DecodeError::VersionMismatch {
                found: version,
                expected: ENTRY_VERSION,
            });
        }

        let field = &buf[..DESCRIPTION_MAX];
        let nul = field
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::MissingNul)?;
        let description =
            std::str::from_utf8(&field[..nul]).map_err(|_| DecodeError::InvalidUtf8)?;
        buf.advance(DESCRIPTION_MAX);

        let mut priority = RolePriorities::default();
        for role in Role::ALL {
            priority[role] = buf.get_u32();
        }

        Ok(Entry {
            description: description.to_string(),
            priority,
        })
    }
}
