//! Sensor source port — supplies the latest parsed snapshot.
//!
//! Snapshot acquisition is decoupled from the control actor: a stale
//! but present snapshot is used as-is, and an entirely absent snapshot
//! makes the tick abstain.

use std::future::Future;

use verdant_domain::sensor::SensorSnapshot;

/// Supplies the most recent sensor snapshot, if any exists yet.
pub trait SensorSource {
    /// The latest available snapshot. `None` before the first poll
    /// completes (or when every sensor is unavailable).
    fn latest_snapshot(&self) -> impl Future<Output = Option<SensorSnapshot>> + Send;
}

impl<T: SensorSource + Send + Sync> SensorSource for std::sync::Arc<T> {
    fn latest_snapshot(&self) -> impl Future<Output = Option<SensorSnapshot>> + Send {
        (**self).latest_snapshot()
    }
}
