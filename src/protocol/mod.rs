//! Client extension protocol
//!
//! Clients manage the stored preferences through a small request/reply
//! protocol carried inside the host's generic extension command. Payloads
//! are tagged structures: every field is a one-byte type tag followed by
//! its value.
//!
//! ```text
//! request:  u32 sub-command | fields...
//! reply:    u32 REPLY | u32 tag | fields...
//! event:    u32 EXTENSION | u32 0xFFFFFFFF | u32 module | string name | u32 EVENT
//! ```

pub mod command;
pub mod context;
pub mod error;
pub mod handler;
pub mod tagstruct;

pub use command::{
    Request, Subcommand, COMMAND_EXTENSION, COMMAND_REPLY, EXT_VERSION, TAG_UNSOLICITED,
};
pub use context::{ClientContext, ConnectionId, NOTIFY_QUEUE};
pub use error::ProtocolError;
pub use handler::{event_notification, handle_request};
pub use tagstruct::{TagStructReader, TagStructWriter, TagValue};
