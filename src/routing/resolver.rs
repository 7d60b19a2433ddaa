//! Highest-priority device resolution
//!
//! For every role, picks the most preferred device of one kind that is
//! currently live. Devices with an entry but no live counterpart are skipped
//! regardless of their rank.

use std::ops::Index;

use crate::host::{DeviceDirectory, DeviceIndex};
use crate::store::{Database, DeviceKind, PriorityStore, Role, NUM_ROLES};

/// Chosen live device per role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleDevices([Option<DeviceIndex>; NUM_ROLES]);

impl RoleDevices {
    /// Chosen device for `role`
    pub fn get(&self, role: Role) -> Option<DeviceIndex> {
        self.0[role.index()]
    }

    /// Whether no role resolved to a device
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }
}

impl Index<Role> for RoleDevices {
    type Output = Option<DeviceIndex>;

    fn index(&self, role: Role) -> &Option<DeviceIndex> {
        &self.0[role.index()]
    }
}

/// Resolve the best live device of `kind` for every role
///
/// `departing` names a device that is still listed by the host but is being
/// unlinked; it is treated as absent.
pub fn resolve<D, H>(
    store: &PriorityStore<D>,
    directory: &H,
    kind: DeviceKind,
    departing: Option<DeviceIndex>,
) -> RoleDevices
where
    D: Database,
    H: DeviceDirectory + ?Sized,
{
    let live: Vec<_> = directory
        .devices(kind)
        .into_iter()
        .filter(|d| Some(d.index) != departing)
        .collect();
    let mut best: [Option<u32>; NUM_ROLES] = [None; NUM_ROLES];
    let mut chosen = RoleDevices::default();

    for (key, entry) in store.entries(kind) {
        for (role, rank) in entry.priority.iter() {
            let slot = role.index();

            if best[slot].is_some_and(|b| rank >= b) {
                continue;
            }

            // Only a live device may claim the role
            if let Some(device) = live.iter().find(|d| d.name == key.name()) {
                best[slot] = Some(rank);
                chosen.0[slot] = Some(device.index);
            }
        }
    }

    chosen
}
