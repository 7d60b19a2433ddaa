//! Device manager core
//!
//! [`DeviceManager`] reacts to host lifecycle notifications, persists what
//! it learns, and reroutes streams when devices come and go. It runs on a
//! single logical worker (see [`service`]), so it holds no locks.
//!
//! # Event flow
//!
//! ```text
//!   device new ────────► restore description from entry
//!   device changed ────► load_or_initialize ─► write ─► trigger_save
//!   device put ────────► reroute (hotplug)          │
//!   device unlink ─────► reroute (rescue)           ├─► notify subscribers
//!   stream new ────────► resolve ─► initial device  └─► arm flush timer
//! ```

pub mod scheduler;
pub mod service;
pub mod subscribers;

use bytes::Bytes;
use tokio::time::Instant;

use crate::config::ManagerConfig;
use crate::error::Result;
use crate::host::{DeviceDirectory, DeviceIndex, NewDeviceData, NewStreamData};
use crate::protocol::handler::event_notification;
use crate::routing::{reroute, resolve};
use crate::store::{
    Database, DeviceKey, DeviceKind, Entry, FileDatabase, PriorityStore, Role, WritePolicy,
};

pub use scheduler::{SaveScheduler, SaveState};
pub use service::{ManagerHandle, ManagerService};
pub use subscribers::Subscribers;

/// Persistent device preference manager
pub struct DeviceManager<D> {
    config: ManagerConfig,
    store: PriorityStore<D>,
    scheduler: SaveScheduler,
    subscribers: Subscribers,
    routing_enabled: bool,
    event: Bytes,
    flushes: u64,
}

impl DeviceManager<FileDatabase> {
    /// Open (or create) the database at the configured path
    pub fn open(config: ManagerConfig) -> Result<Self> {
        let db = FileDatabase::open(&config.database_path, true).map_err(|e| {
            tracing::error!(
                path = %config.database_path.display(),
                error = %e,
                "Failed to open device database"
            );
            e
        })?;

        tracing::info!(
            path = %config.database_path.display(),
            "Successfully opened database file"
        );

        Ok(Self::new(db, config))
    }
}

impl<D: Database> DeviceManager<D> {
    /// Create a manager over an opened database
    pub fn new(db: D, config: ManagerConfig) -> Self {
        Self {
            scheduler: SaveScheduler::new(config.save_interval),
            routing_enabled: config.role_device_priority_routing,
            event: event_notification(&config),
            store: PriorityStore::new(db),
            subscribers: Subscribers::new(),
            flushes: 0,
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Persisted entries
    pub fn store(&self) -> &PriorityStore<D> {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut PriorityStore<D> {
        &mut self.store
    }

    /// Change notification subscribers
    pub fn subscribers(&self) -> &Subscribers {
        &self.subscribers
    }

    pub(crate) fn subscribers_mut(&mut self) -> &mut Subscribers {
        &mut self.subscribers
    }

    /// Whether role-based routing is currently enabled
    pub fn routing_enabled(&self) -> bool {
        self.routing_enabled
    }

    /// Enable or disable role-based routing
    pub fn set_routing_enabled(&mut self, enabled: bool) {
        tracing::info!(enabled, "Role device priority routing");
        self.routing_enabled = enabled;
    }

    /// Record devices that were present before the manager started
    pub fn initialize<H: DeviceDirectory + ?Sized>(&mut self, directory: &H) {
        for kind in DeviceKind::ALL {
            for device in directory.devices(kind) {
                self.on_device_changed(directory, kind, device.index);
            }
        }
    }

    /// Device about to be created: restore its remembered description
    pub fn on_device_new(&self, kind: DeviceKind, data: &mut NewDeviceData) {
        let key = DeviceKey::new(kind, data.name.as_str());
        let Some(entry) = self.store.read(&key) else {
            return;
        };

        if data.description.as_deref() != Some(entry.description.as_str()) {
            tracing::info!(kind = %kind, device = %data.name, "Restoring description");
            data.description = Some(entry.description);
        }
    }

    /// Device created or changed: persist its entry if anything changed
    pub fn on_device_changed<H: DeviceDirectory + ?Sized>(
        &mut self,
        directory: &H,
        kind: DeviceKind,
        index: DeviceIndex,
    ) {
        let Some(device) = directory.device(kind, index) else {
            return;
        };
        if device.is_monitor {
            return;
        }

        let key = DeviceKey::new(kind, device.name);
        let (mut entry, old) = self.store.load_or_initialize(&key);
        entry.set_description(device.description.as_deref().unwrap_or_default());

        if old.is_some_and(|old| old.same_description(&entry)) {
            return;
        }

        tracing::info!(key = %key, "Storing device");
        match self.store.write(&key, &entry, WritePolicy::Upsert) {
            Ok(()) => self.trigger_save(),
            Err(e) => tracing::warn!(key = %key, error = %e, "Could not save device"),
        }
    }

    /// Stream about to be created: pick an initial device by role
    pub fn on_stream_new<H: DeviceDirectory + ?Sized>(
        &self,
        directory: &H,
        kind: DeviceKind,
        data: &mut NewStreamData,
    ) {
        if !self.routing_enabled || data.direct_on_input {
            return;
        }

        if data.device.is_some() {
            tracing::debug!("Not restoring device for stream, because already set");
            return;
        }

        let Some(role) = Role::from_property(data.role.as_deref()) else {
            return;
        };

        let chosen = resolve(&self.store, directory, kind, None);
        if let Some(device) = chosen[role].filter(|&d| directory.device(kind, d).is_some()) {
            tracing::debug!(kind = %kind, role = %role, device, "Routing new stream");
            data.device = Some(device);
            data.save_device = true;
        }
    }

    /// Device became live
    ///
    /// Returns the number of streams asked to move.
    pub fn on_device_put<H: DeviceDirectory + ?Sized>(
        &self,
        directory: &mut H,
        kind: DeviceKind,
    ) -> usize {
        if !self.config.on_hotplug || !self.routing_enabled {
            return 0;
        }
        reroute(&self.store, directory, kind, None)
    }

    /// Device going away
    ///
    /// Returns the number of streams asked to move.
    pub fn on_device_unlink<H: DeviceDirectory + ?Sized>(
        &self,
        directory: &mut H,
        kind: DeviceKind,
        index: DeviceIndex,
    ) -> usize {
        if !self.config.on_rescue || !self.routing_enabled {
            return 0;
        }
        // Nothing is worth moving while the host shuts down
        if directory.is_shutting_down() {
            return 0;
        }
        reroute(&self.store, directory, kind, Some(index))
    }

    /// Client connection closed
    pub fn on_connection_closed(&mut self, connection_id: u64) {
        if self.subscribers.unsubscribe(connection_id) {
            tracing::debug!(connection = connection_id, "Subscriber disconnected");
        }
    }

    /// Push a remembered description onto live devices with the entry's name
    pub fn apply_entry<H: DeviceDirectory + ?Sized>(
        &self,
        directory: &mut H,
        key: &DeviceKey,
        entry: &Entry,
    ) {
        for device in directory.devices(key.kind()) {
            if device.name != key.name() {
                continue;
            }
            if device.is_monitor {
                tracing::warn!(
                    device = %device.name,
                    "Refusing to set the description for monitor source"
                );
                continue;
            }

            tracing::info!(kind = %key.kind(), device = %device.name, "Setting description");
            directory.set_description(key.kind(), device.index, &entry.description);
        }
    }

    /// Notify subscribers and arm the flush timer
    pub fn trigger_save(&mut self) {
        self.subscribers.notify(&self.event);

        if self.scheduler.trigger(Instant::now()) {
            tracing::trace!(interval = ?self.scheduler.interval(), "Flush scheduled");
        }
    }

    /// When the pending flush is due, if one is pending
    pub fn next_flush(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Flush the database if the timer is due at `now`
    ///
    /// Returns whether a flush happened.
    pub fn flush_due(&mut self, now: Instant) -> bool {
        if !self.scheduler.take_due(now) {
            return false;
        }
        self.flush();
        true
    }

    /// Number of completed flushes
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    fn flush(&mut self) {
        match self.store.sync() {
            Ok(()) => {
                self.flushes += 1;
                tracing::info!("Synced.");
            }
            Err(e) => tracing::error!(error = %e, "Failed to sync device database"),
        }
    }

    /// Flush anything pending and close the database
    pub fn shutdown(&mut self) {
        if self.scheduler.cancel() {
            self.flush();
        }
        if let Err(e) = self.store.close() {
            tracing::error!(error = %e, "Failed to close device database");
        }
    }
}
