//! Polling coordinator for the ANIO integration
//!
//! Aggregates the cloud API's endpoints into one consolidated per-device
//! state map each cycle, computes geofence membership and online status,
//! and fires events for newly received watch messages.

mod coordinator;
mod geofence;
mod messages;

pub use coordinator::{AnioDataUpdateCoordinator, UpdateError};
pub use geofence::{haversine_distance_m, is_inside_geofence};
pub use messages::MessageTracker;
