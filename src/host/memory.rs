//! In-process host directory
//!
//! A cloneable handle over shared device, stream and hook tables. It lets
//! the manager be embedded (and exercised) without a real sound server:
//! one clone is handed to the manager, another is kept to add and remove
//! devices and to inspect the result.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::directory::{DeviceDirectory, DeviceIndex, DeviceInfo, StreamIndex, StreamInfo};
use super::hooks::{Hook, HookPriority, HookRegistry, SlotId};
use crate::store::DeviceKind;

#[derive(Debug, Default)]
struct Tables {
    devices: BTreeMap<DeviceIndex, DeviceInfo>,
    streams: BTreeMap<StreamIndex, StreamInfo>,
}

#[derive(Debug, Default)]
struct State {
    sinks: Tables,
    sources: Tables,
    hooks: BTreeMap<SlotId, (Hook, HookPriority)>,
    next_slot: SlotId,
    next_index: u32,
    moves: Vec<(DeviceKind, StreamIndex, DeviceIndex)>,
    shutting_down: bool,
}

impl State {
    fn tables(&self, kind: DeviceKind) -> &Tables {
        match kind {
            DeviceKind::Sink => &self.sinks,
            DeviceKind::Source => &self.sources,
        }
    }

    fn tables_mut(&mut self, kind: DeviceKind) -> &mut Tables {
        match kind {
            DeviceKind::Sink => &mut self.sinks,
            DeviceKind::Source => &mut self.sources,
        }
    }

    fn allocate_index(&mut self) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }
}

/// Shared in-memory device directory and hook registry
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    inner: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a live device and return its index
    pub fn add_device(&self, kind: DeviceKind, name: &str, description: Option<&str>) -> DeviceIndex {
        let mut state = self.state();
        let index = state.allocate_index();
        state
            .tables_mut(kind)
            .devices
            .insert(index, DeviceInfo::new(index, name, description));
        index
    }

    /// Add a monitor source for an existing sink
    pub fn add_monitor(&self, name: &str) -> DeviceIndex {
        let mut state = self.state();
        let index = state.allocate_index();
        let info = DeviceInfo::new(index, name, Some(name)).monitor();
        state.sources.devices.insert(index, info);
        index
    }

    /// Remove a live device; its streams are left without a device
    pub fn remove_device(&self, kind: DeviceKind, index: DeviceIndex) -> Option<DeviceInfo> {
        let mut state = self.state();
        let tables = state.tables_mut(kind);
        for stream in tables.streams.values_mut() {
            if stream.device == Some(index) {
                stream.device = None;
            }
        }
        tables.devices.remove(&index)
    }

    /// Add a live stream; `stream.index` is replaced with a fresh index
    pub fn add_stream(&self, kind: DeviceKind, mut stream: StreamInfo) -> StreamIndex {
        let mut state = self.state();
        let index = state.allocate_index();
        stream.index = index;
        state.tables_mut(kind).streams.insert(index, stream);
        index
    }

    /// Current state of a stream
    pub fn stream(&self, kind: DeviceKind, index: StreamIndex) -> Option<StreamInfo> {
        self.state().tables(kind).streams.get(&index).cloned()
    }

    /// Move requests received so far, in order
    pub fn moves(&self) -> Vec<(DeviceKind, StreamIndex, DeviceIndex)> {
        self.state().moves.clone()
    }

    /// Mark the host as shutting down
    pub fn set_shutting_down(&self, shutting_down: bool) {
        self.state().shutting_down = shutting_down;
    }

    /// Whether `hook` is currently connected
    pub fn is_connected(&self, hook: Hook) -> bool {
        self.state().hooks.values().any(|(h, _)| *h == hook)
    }

    /// Number of connected hooks
    pub fn hook_count(&self) -> usize {
        self.state().hooks.len()
    }
}

impl DeviceDirectory for MemoryDirectory {
    fn devices(&self, kind: DeviceKind) -> Vec<DeviceInfo> {
        self.state().tables(kind).devices.values().cloned().collect()
    }

    fn streams(&self, kind: DeviceKind) -> Vec<StreamInfo> {
        self.state().tables(kind).streams.values().cloned().collect()
    }

    fn set_description(&mut self, kind: DeviceKind, device: DeviceIndex, description: &str) {
        if let Some(info) = self.state().tables_mut(kind).devices.get_mut(&device) {
            info.description = Some(description.to_string());
        }
    }

    fn move_stream(&mut self, kind: DeviceKind, stream: StreamIndex, device: DeviceIndex) {
        let mut state = self.state();
        state.moves.push((kind, stream, device));

        let tables = state.tables_mut(kind);
        if !tables.devices.contains_key(&device) {
            return;
        }
        if let Some(info) = tables.streams.get_mut(&stream) {
            info.device = Some(device);
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }
}

impl HookRegistry for MemoryDirectory {
    fn connect(&mut self, hook: Hook, priority: HookPriority) -> SlotId {
        let mut state = self.state();
        state.next_slot += 1;
        let slot = state.next_slot;
        state.hooks.insert(slot, (hook, priority));
        slot
    }

    fn disconnect(&mut self, slot: SlotId) {
        self.state().hooks.remove(&slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devices_by_kind() {
        let dir = MemoryDirectory::new();
        let a = dir.add_device(DeviceKind::Sink, "a", Some("A"));
        let m = dir.add_device(DeviceKind::Source, "m", None);

        assert_eq!(dir.devices(DeviceKind::Sink).len(), 1);
        assert_eq!(dir.device(DeviceKind::Sink, a).unwrap().name, "a");
        assert!(dir.device(DeviceKind::Sink, m).is_none());
        assert_eq!(dir.device_by_name(DeviceKind::Source, "m").unwrap().index, m);
    }

    #[test]
    fn test_move_and_remove() {
        let mut dir = MemoryDirectory::new();
        let a = dir.add_device(DeviceKind::Sink, "a", None);
        let b = dir.add_device(DeviceKind::Sink, "b", None);
        let s = dir.add_stream(DeviceKind::Sink, StreamInfo::new(0, a, Some("music")));

        dir.move_stream(DeviceKind::Sink, s, b);
        assert_eq!(dir.stream(DeviceKind::Sink, s).unwrap().device, Some(b));

        dir.remove_device(DeviceKind::Sink, b);
        assert_eq!(dir.stream(DeviceKind::Sink, s).unwrap().device, None);

        // Moving to a device that is gone is recorded but has no effect
        dir.move_stream(DeviceKind::Sink, s, b);
        assert_eq!(dir.moves().len(), 2);
        assert_eq!(dir.stream(DeviceKind::Sink, s).unwrap().device, None);
    }

    #[test]
    fn test_clones_share_state() {
        let dir = MemoryDirectory::new();
        let mut other = dir.clone();
        let a = dir.add_device(DeviceKind::Sink, "a", None);
        other.set_description(DeviceKind::Sink, a, "Renamed");
        assert_eq!(
            dir.device(DeviceKind::Sink, a).unwrap().description.as_deref(),
            Some("Renamed")
        );
    }
}
