//! Stream rerouting
//!
//! Moves in-flight streams to the best live device for their role after a
//! device appears or disappears. Streams placed explicitly by the user, or
//! caught mid-transition, are left alone. Failed moves are not retried.

use crate::host::{DeviceDirectory, DeviceIndex, StreamInfo};
use crate::store::{Database, DeviceKind, PriorityStore, Role};

use super::resolver::{resolve, RoleDevices};

/// Why a stream was left where it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Device was explicitly chosen and saved
    Pinned,
    /// Stream is already being moved
    NoDevice,
    /// Stream is not fully linked yet
    NotLinked,
    /// Capture stream bound to a single playback stream
    DirectOnInput,
    /// Role string has no priority slot
    UnknownRole,
    /// No live device ranked for the role
    NoPreference,
    /// Stream already sits on the preferred device
    AlreadyPlaced,
}

/// Decide where `stream` should go, if anywhere
pub fn route_for(stream: &StreamInfo, chosen: &RoleDevices) -> Result<DeviceIndex, SkipReason> {
    if stream.pinned {
        return Err(SkipReason::Pinned);
    }
    if stream.direct_on_input {
        return Err(SkipReason::DirectOnInput);
    }
    let current = stream.device.ok_or(SkipReason::NoDevice)?;
    if !stream.linked {
        return Err(SkipReason::NotLinked);
    }

    let role = Role::from_property(stream.role.as_deref()).ok_or(SkipReason::UnknownRole)?;
    let target = chosen[role].ok_or(SkipReason::NoPreference)?;

    if target == current {
        return Err(SkipReason::AlreadyPlaced);
    }
    Ok(target)
}

/// Move every eligible stream of `kind` to its preferred device
///
/// `departing` is a device being unlinked; it is never chosen as a target.
/// Returns the number of move requests issued.
pub fn reroute<D, H>(
    store: &PriorityStore<D>,
    directory: &mut H,
    kind: DeviceKind,
    departing: Option<DeviceIndex>,
) -> usize
where
    D: Database,
    H: DeviceDirectory + ?Sized,
{
    let chosen = resolve(store, directory, kind, departing);
    let mut moved = 0;

    for stream in directory.streams(kind) {
        match route_for(&stream, &chosen) {
            Ok(target) => {
                // The resolver only picks live devices, but the host may have
                // dropped it since.
                if directory.device(kind, target).is_none() {
                    continue;
                }

                tracing::info!(
                    kind = %kind,
                    stream = stream.index,
                    from = ?stream.device,
                    to = target,
                    role = stream.role.as_deref().unwrap_or(""),
                    "Rerouting stream"
                );
                directory.move_stream(kind, stream.index, target);
                moved += 1;
            }
            Err(reason) => {
                tracing::trace!(kind = %kind, stream = stream.index, ?reason, "Stream not rerouted");
            }
        }
    }

    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryDirectory;
    use crate::store::{DeviceKey, Entry, MemoryDatabase, RolePriorities, WritePolicy};

    fn store() -> PriorityStore<MemoryDatabase> {
        let mut store = PriorityStore::new(MemoryDatabase::new());
        for (name, rank) in [("A", 1), ("B", 2)] {
            store
                .write(
                    &DeviceKey::sink(name),
                    &Entry::new(name, RolePriorities::uniform(rank)),
                    WritePolicy::Upsert,
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_unplug_moves_music_stream() {
        let store = store();
        let mut dir = MemoryDirectory::new();
        let a = dir.add_device(DeviceKind::Sink, "A", None);
        let b = dir.add_device(DeviceKind::Sink, "B", None);
        let stream = dir.add_stream(DeviceKind::Sink, StreamInfo::new(0, a, Some("music")));

        // Nothing to do while A is present
        assert_eq!(reroute(&store, &mut dir, DeviceKind::Sink, None), 0);

        // A is still listed while its unlink is being processed
        assert_eq!(reroute(&store, &mut dir, DeviceKind::Sink, Some(a)), 1);
        assert_eq!(dir.stream(DeviceKind::Sink, stream).unwrap().device, Some(b));
    }

    #[test]
    fn test_hotplug_moves_to_preferred() {
        let store = store();
        let mut dir = MemoryDirectory::new();
        let b = dir.add_device(DeviceKind::Sink, "B", None);
        let stream = dir.add_stream(DeviceKind::Sink, StreamInfo::new(0, b, Some("music")));

        let a = dir.add_device(DeviceKind::Sink, "A", None);
        assert_eq!(reroute(&store, &mut dir, DeviceKind::Sink, None), 1);
        assert_eq!(dir.stream(DeviceKind::Sink, stream).unwrap().device, Some(a));
        assert_eq!(dir.moves(), vec![(DeviceKind::Sink, stream, a)]);
    }

    #[test]
    fn test_skip_rules() {
        let store = store();
        let mut dir = MemoryDirectory::new();
        let b = dir.add_device(DeviceKind::Sink, "B", None);

        let mut pinned = StreamInfo::new(0, b, Some("music"));
        pinned.pinned = true;
        let mut unlinked = StreamInfo::new(0, b, None);
        unlinked.linked = false;
        let mut moving = StreamInfo::new(0, b, None);
        moving.device = None;
        let unknown = StreamInfo::new(0, b, Some("ringtone"));

        for stream in [pinned, unlinked, moving, unknown] {
            dir.add_stream(DeviceKind::Sink, stream);
        }

        dir.add_device(DeviceKind::Sink, "A", None);
        assert_eq!(reroute(&store, &mut dir, DeviceKind::Sink, None), 0);
        assert!(dir.moves().is_empty());
    }

    #[test]
    fn test_route_for_reasons() {
        let mut chosen = RoleDevices::default();
        let stream = StreamInfo::new(1, 5, Some("game"));
        assert_eq!(route_for(&stream, &chosen), Err(SkipReason::NoPreference));

        chosen = {
            let store = store();
            let dir = MemoryDirectory::new();
            dir.add_device(DeviceKind::Sink, "A", None);
            resolve(&store, &dir, DeviceKind::Sink, None)
        };
        let target = chosen[Role::Game].unwrap();
        let placed = StreamInfo::new(1, target, Some("game"));
        assert_eq!(route_for(&placed, &chosen), Err(SkipReason::AlreadyPlaced));

        let mut direct = StreamInfo::new(1, 5, None);
        direct.direct_on_input = true;
        assert_eq!(route_for(&direct, &chosen), Err(SkipReason::DirectOnInput));
    }
}
