//! # verdant-adapter-virtual
//!
//! Simulated hardware for testing and demonstration.
//!
//! ## Provided adapters
//!
//! - [`VirtualRelayBank`] — in-memory relay driver; records committed
//!   states and supports scripted per-device failures and latency
//! - [`VirtualSensorRig`] — deterministic drifting sensor readings
//!   served as snapshots, with per-kind outage switches
//! - [`MemoryEventSink`] — bounded in-memory control-event log
//!
//! ## Dependency rule
//! Depends on `verdant-app` (port traits) and `verdant-domain` only.

mod relay;
mod sensors;
mod sink;

pub use relay::VirtualRelayBank;
pub use sensors::{SimulatedSensor, VirtualSensorRig};
pub use sink::MemoryEventSink;
