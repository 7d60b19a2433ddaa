//! Lifecycle hook registration
//!
//! The manager connects a fixed set of typed hooks when it starts and
//! disconnects all of them as one group when it stops. Which hooks are
//! connected depends on the configuration: device-put hooks only with
//! hotplug handling, device-unlink hooks only with rescue handling.

use crate::config::ManagerConfig;
use crate::store::DeviceKind;

/// Handle returned by a hook registry for one connected hook
pub type SlotId = u64;

/// Host lifecycle notification the manager can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Device about to be created (pre-commit, mutable)
    DeviceNew(DeviceKind),
    /// Device created or its properties changed (post-commit)
    DeviceChanged(DeviceKind),
    /// Stream about to be created (pre-commit, mutable)
    StreamNew(DeviceKind),
    /// Device became live
    DevicePut(DeviceKind),
    /// Device going away
    DeviceUnlink(DeviceKind),
    /// Client connection closed
    ConnectionUnlink,
}

/// Ordering of a hook relative to other hooks on the same event
///
/// Lower values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookPriority(pub i32);

impl HookPriority {
    pub const EARLY: HookPriority = HookPriority(-100);
    pub const NORMAL: HookPriority = HookPriority(0);
    pub const LATE: HookPriority = HookPriority(100);

    /// Offset from this priority
    pub const fn offset(self, by: i32) -> HookPriority {
        HookPriority(self.0 + by)
    }
}

/// Anything hooks can be connected to
pub trait HookRegistry {
    /// Connect a hook and return its slot
    fn connect(&mut self, hook: Hook, priority: HookPriority) -> SlotId;

    /// Disconnect a previously connected slot
    fn disconnect(&mut self, slot: SlotId);
}

/// Hooks the manager needs for `config`, with their priorities
pub fn hook_plan(config: &ManagerConfig) -> Vec<(Hook, HookPriority)> {
    let mut plan = vec![(Hook::ConnectionUnlink, HookPriority::NORMAL)];

    for kind in DeviceKind::ALL {
        plan.push((Hook::DeviceChanged(kind), HookPriority::NORMAL));
        // Descriptions are restored before other modules look at the device
        plan.push((Hook::DeviceNew(kind), HookPriority::EARLY));
        // Slightly after stream-restore and intended-roles style routing
        plan.push((Hook::StreamNew(kind), HookPriority::EARLY.offset(15)));

        if config.on_hotplug {
            plan.push((Hook::DevicePut(kind), HookPriority::LATE.offset(15)));
        }
        if config.on_rescue {
            plan.push((Hook::DeviceUnlink(kind), HookPriority::LATE.offset(15)));
        }
    }

    plan
}

/// Set of hooks connected together and torn down together
#[derive(Debug, Default)]
pub struct HookGroup {
    slots: Vec<(Hook, SlotId)>,
}

impl HookGroup {
    /// Connect every hook `config` calls for
    pub fn register<R: HookRegistry + ?Sized>(registry: &mut R, config: &ManagerConfig) -> Self {
        let slots = hook_plan(config)
            .into_iter()
            .map(|(hook, priority)| (hook, registry.connect(hook, priority)))
            .collect::<Vec<_>>();

        tracing::debug!(hooks = slots.len(), "Lifecycle hooks connected");

        Self { slots }
    }

    pub fn contains(&self, hook: Hook) -> bool {
        self.slots.iter().any(|(h, _)| *h == hook)
    }

    pub fn hooks(&self) -> impl Iterator<Item = Hook> + '_ {
        self.slots.iter().map(|(h, _)| *h)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Disconnect every hook in the group
    pub fn teardown<R: HookRegistry + ?Sized>(self, registry: &mut R) {
        for (_, slot) in self.slots {
            registry.disconnect(slot);
        }
    }
}
