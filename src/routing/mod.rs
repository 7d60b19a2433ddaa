//! Role-based routing
//!
//! The [`resolver`] turns persisted rankings plus the live device set into
//! one preferred device per role; [`reroute`] applies that to in-flight
//! streams.
//!
//! ```text
//!   PriorityStore ──► resolve(kind) ──► RoleDevices ──► reroute(kind)
//!        ▲                 ▲                                 │
//!        │            live devices                     move_stream()
//!   persisted ranks   (DeviceDirectory)                      ▼
//!                                                       DeviceDirectory
//! ```

pub mod reroute;
pub mod resolver;

pub use reroute::{reroute, route_for, SkipReason};
pub use resolver::{resolve, RoleDevices};
