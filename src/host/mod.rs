//! Host boundary
//!
//! Everything the manager consumes from the sound server: the live device
//! and stream directory and lifecycle hook registration. [`MemoryDirectory`]
//! implements both for embedding without a real server.

pub mod directory;
pub mod hooks;
pub mod memory;

pub use directory::{
    DeviceDirectory, DeviceIndex, DeviceInfo, NewDeviceData, NewStreamData, StreamIndex,
    StreamInfo,
};
pub use hooks::{hook_plan, Hook, HookGroup, HookPriority, HookRegistry, SlotId};
pub use memory::MemoryDirectory;
