//! Extension sub-commands and request parsing
//!
//! Request payload: `u32 sub-command` followed by the sub-command's fields.
//!
//! | Sub-command | Fields |
//! |---|---|
//! | TEST | none |
//! | READ | none |
//! | RENAME | string device key, string description |
//! | DELETE | string device key, repeated |
//! | ROLE_DEVICE_PRIORITY_ROUTING | boolean |
//! | PREFER_DEVICE / DEFER_DEVICE | string role, string device key |
//! | SUBSCRIBE | boolean |

use bytes::Bytes;

use super::error::ProtocolError;
use super::tagstruct::{TagStructReader, TagStructWriter};
use crate::store::{DeviceKey, Role, Shift};

/// Extension protocol version reported by TEST
pub const EXT_VERSION: u32 = 1;

/// Generic reply command
pub const COMMAND_REPLY: u32 = 2;

/// Generic extension command, used for change notifications
pub const COMMAND_EXTENSION: u32 = 80;

/// Tag used for unsolicited messages
pub const TAG_UNSOLICITED: u32 = u32::MAX;

/// Sub-command numbers
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    Test = 0,
    Read = 1,
    Rename = 2,
    Delete = 3,
    RoleDevicePriorityRouting = 4,
    PreferDevice = 5,
    DeferDevice = 6,
    Subscribe = 7,
    /// Server to client: something changed
    Event = 8,
}

impl Subcommand {
    pub fn from_u32(value: u32) -> Result<Self, ProtocolError> {
        let command = match value {
            0 => Subcommand::Test,
            1 => Subcommand::Read,
            2 => Subcommand::Rename,
            3 => Subcommand::Delete,
            4 => Subcommand::RoleDevicePriorityRouting,
            5 => Subcommand::PreferDevice,
            6 => Subcommand::DeferDevice,
            7 => Subcommand::Subscribe,
            8 => Subcommand::Event,
            other => return Err(ProtocolError::UnknownCommand(other)),
        };
        Ok(command)
    }
}

/// A decoded client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Report the protocol version
    Test,
    /// List every valid entry
    Read,
    /// Replace the description of an existing entry
    Rename {
        device: DeviceKey,
        description: String,
    },
    /// Remove entries
    Delete(Vec<DeviceKey>),
    /// Toggle role-based routing
    RoleDevicePriorityRouting(bool),
    /// Swap a device with its neighbour in one role
    Reorder {
        shift: Shift,
        role: Role,
        device: DeviceKey,
    },
    /// Join or leave the change notification set
    Subscribe(bool),
}

fn required_string(
    reader: &mut TagStructReader,
    field: &'static str,
) -> Result<String, ProtocolError> {
    let value = reader
        .get_string()?
        .ok_or(ProtocolError::MissingField(field))?;
    if value.is_empty() {
        return Err(ProtocolError::EmptyField(field));
    }
    Ok(value)
}

fn device_key(reader: &mut TagStructReader) -> Result<DeviceKey, ProtocolError> {
    let raw = required_string(reader, "device")?;
    DeviceKey::parse(&raw).ok_or(ProtocolError::InvalidKey(raw))
}

impl Request {
    /// Decode a request payload
    pub fn parse(payload: Bytes) -> Result<Request, ProtocolError> {
        let mut reader = TagStructReader::new(payload);
        let command = Subcommand::from_u32(reader.get_u32()?)?;

        let request = match command {
            Subcommand::Test => Request::Test,
            Subcommand::Read => Request::Read,
            Subcommand::Rename => {
                let device = device_key(&mut reader)?;
                let description = required_string(&mut reader, "description")?;
                Request::Rename {
                    device,
                    description,
                }
            }
            Subcommand::Delete => {
                let mut devices = Vec::new();
                while !reader.eof() {
                    devices.push(device_key(&mut reader)?);
                }
                Request::Delete(devices)
            }
            Subcommand::RoleDevicePriorityRouting => {
                Request::RoleDevicePriorityRouting(reader.get_boolean()?)
            }
            Subcommand::PreferDevice | Subcommand::DeferDevice => {
                // The empty role is valid: it is the "none" role
                let role = reader
                    .get_string()?
                    .ok_or(ProtocolError::MissingField("role"))?;
                let device = device_key(&mut reader)?;
                let role = Role::parse(&role).ok_or(ProtocolError::UnknownRole(role))?;
                let shift = if command == Subcommand::PreferDevice {
                    Shift::Prefer
                } else {
                    Shift::Defer
                };
                Request::Reorder {
                    shift,
                    role,
                    device,
                }
            }
            Subcommand::Subscribe => Request::Subscribe(reader.get_boolean()?),
            // Notifications only flow server to client
            Subcommand::Event => return Err(ProtocolError::UnknownCommand(command as u32)),
        };

        reader.expect_eof()?;
        Ok(request)
    }

    /// Sub-command this request is sent as
    pub fn subcommand(&self) -> Subcommand {
        match self {
            Request::Test => Subcommand::Test,
            Request::Read => Subcommand::Read,
            Request::Rename { .. } => Subcommand::Rename,
            Request::Delete(_) => Subcommand::Delete,
            Request::RoleDevicePriorityRouting(_) => Subcommand::RoleDevicePriorityRouting,
            Request::Reorder {
                shift: Shift::Prefer,
                ..
            } => Subcommand::PreferDevice,
            Request::Reorder {
                shift: Shift::Defer,
                ..
            } => Subcommand::DeferDevice,
            Request::Subscribe(_) => Subcommand::Subscribe,
        }
    }

    /// Encode as a client would send it
    pub fn encode(&self) -> Bytes {
        let mut w = TagStructWriter::new();
        w.put_u32(self.subcommand() as u32);

        match self {
            Request::Test | Request::Read => {}
            Request::Rename {
                device,
                description,
            } => {
                w.put_string(Some(device.to_string().as_str()))
                    .put_string(Some(description.as_str()));
            }
            Request::Delete(devices) => {
                for device in devices {
                    w.put_string(Some(device.to_string().as_str()));
                }
            }
            Request::RoleDevicePriorityRouting(enable) | Request::Subscribe(enable) => {
                w.put_boolean(*enable);
            }
            Request::Reorder { role, device, .. } => {
                w.put_string(Some(role.as_str()))
                    .put_string(Some(device.to_string().as_str()));
            }
        }

        w.finish()
    }
}
