//! Persistent device preferences with role-based routing
//!
//! Remembers every sink and source ever seen, together with a per-role
//! priority ranking, and uses that ranking to pick a device for new
//! streams and to move existing streams when devices come and go.
//!
//! # Layout
//!
//! - [`store`]: entry codec, database engines and the priority store
//! - [`routing`]: best-device resolution and stream rerouting
//! - [`host`]: the live device directory and lifecycle hooks consumed
//! - [`manager`]: the event-driven core and its single-task service
//! - [`protocol`]: the client extension protocol
//!
//! # Example
//!
//! ```no_run
//! use device_manager::{DeviceManager, ManagerConfig, ManagerService, MemoryDirectory};
//! use device_manager::store::DeviceKind;
//!
//! # async fn run() -> device_manager::Result<()> {
//! let config = ManagerConfig::from_args("on_hotplug=yes on_rescue=no")?
//!     .role_device_priority_routing(true);
//! let manager = DeviceManager::open(config)?;
//!
//! let directory = MemoryDirectory::new();
//! let (handle, task) = ManagerService::spawn(manager, directory.clone());
//!
//! let speakers = directory.add_device(DeviceKind::Sink, "alsa_output.speakers", Some("Speakers"));
//! handle.device_changed(DeviceKind::Sink, speakers).await?;
//!
//! handle.shutdown().await?;
//! let _ = task.await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod manager;
pub mod protocol;
pub mod routing;
pub mod store;

pub use config::ManagerConfig;
pub use error::{ConfigError, Error, Result};
pub use host::{DeviceDirectory, HookRegistry, MemoryDirectory};
pub use manager::{DeviceManager, ManagerHandle, ManagerService};
pub use store::{Database, FileDatabase, MemoryDatabase, PriorityStore};
