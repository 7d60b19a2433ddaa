//! Live device and stream directory
//!
//! The host owns devices and streams; the manager only reads them and asks
//! for descriptions to be set or streams to be moved.

use crate::store::DeviceKind;

/// Index of a live device within its kind
pub type DeviceIndex = u32;

/// Index of a live stream within its kind
pub type StreamIndex = u32;

/// Snapshot of a live sink or source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: DeviceIndex,
    pub name: String,
    /// Current `device.description` property
    pub description: Option<String>,
    /// Source monitoring a sink (never persisted)
    pub is_monitor: bool,
}

impl DeviceInfo {
    /// Create a non-monitor device
    pub fn new(index: DeviceIndex, name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            index,
            name: name.into(),
            description: description.map(str::to_string),
            is_monitor: false,
        }
    }

    /// Mark the device as a monitor source
    pub fn monitor(mut self) -> Self {
        self.is_monitor = true;
        self
    }
}

/// Snapshot of a live stream (sink input or source output)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: StreamIndex,
    /// Device the stream is attached to; `None` while it is being moved
    pub device: Option<DeviceIndex>,
    /// `media.role` property
    pub role: Option<String>,
    /// Device was explicitly chosen and saved by the user
    pub pinned: bool,
    /// Stream is fully linked
    pub linked: bool,
    /// Capture stream attached directly to one playback stream
    pub direct_on_input: bool,
}

impl StreamInfo {
    /// A linked, unpinned stream on `device`
    pub fn new(index: StreamIndex, device: DeviceIndex, role: Option<&str>) -> Self {
        Self {
            index,
            device: Some(device),
            role: role.map(str::to_string),
            pinned: false,
            linked: true,
            direct_on_input: false,
        }
    }
}

/// Pre-commit data for a device about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeviceData {
    /// Name the device will get
    pub name: String,
    /// Description it will be created with
    pub description: Option<String>,
}

impl NewDeviceData {
    pub fn new(name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            name: name.into(),
            description: description.map(str::to_string),
        }
    }
}

/// Pre-commit data for a stream about to be created
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewStreamData {
    /// `media.role` property
    pub role: Option<String>,
    /// Device chosen so far
    pub device: Option<DeviceIndex>,
    /// Whether the chosen device should be remembered for the stream
    pub save_device: bool,
    /// Capture stream attached directly to one playback stream
    pub direct_on_input: bool,
}

impl NewStreamData {
    pub fn with_role(role: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            ..Default::default()
        }
    }
}

/// Host directory of live devices and streams
///
/// Stream methods take the kind of device the streams attach to: sink
/// inputs for [`DeviceKind::Sink`], source outputs for [`DeviceKind::Source`].
pub trait DeviceDirectory {
    /// Every live device of `kind`
    fn devices(&self, kind: DeviceKind) -> Vec<DeviceInfo>;

    /// Every live stream attached to devices of `kind`
    fn streams(&self, kind: DeviceKind) -> Vec<StreamInfo>;

    /// Set the description of a live device
    fn set_description(&mut self, kind: DeviceKind, device: DeviceIndex, description: &str);

    /// Ask the host to move a stream; the outcome is observed later, if at all
    fn move_stream(&mut self, kind: DeviceKind, stream: StreamIndex, device: DeviceIndex);

    /// Whether the host is shutting down
    fn is_shutting_down(&self) -> bool {
        false
    }

    /// Look up a live device by index
    fn device(&self, kind: DeviceKind, index: DeviceIndex) -> Option<DeviceInfo> {
        self.devices(kind).into_iter().find(|d| d.index == index)
    }

    /// Look up a live device by name
    fn device_by_name(&self, kind: DeviceKind, name: &str) -> Option<DeviceInfo> {
        self.devices(kind).into_iter().find(|d| d.name == name)
    }
}
