//! Persistent device preference store
//!
//! Remembers a description and a per-role priority ranking for every device
//! that has ever been seen.
//!
//! # Layout
//!
//! ```text
//!   PriorityStore<D: Database>
//!   ┌──────────────────────────────────────┐
//!   │ "sink:alsa_output.pci"   -> Entry    │
//!   │ "sink:bluez_sink.headset"-> Entry    │
//!   │ "source:alsa_input.usb"  -> Entry    │
//!   └──────────────────────────────────────┘
//!   Entry = { description, priority[Role] }
//! ```
//!
//! Ranks are compared only within one kind. Lower rank means more
//! preferred; a newly seen device ranks last in every role.

pub mod database;
pub mod entry;
pub mod error;
pub mod file;
pub mod key;
#[allow(clippy::module_inception)]
pub mod store;

pub use database::{Database, MemoryDatabase};
pub use entry::{
    Entry, Role, RolePriorities, DESCRIPTION_MAX, ENTRY_SIZE, ENTRY_VERSION, NUM_ROLES,
};
pub use error::{DecodeError, StoreError};
pub use file::FileDatabase;
pub use key::{DeviceKey, DeviceKind};
pub use store::{PriorityStore, Shift, WritePolicy};
