//! # verdant-domain
//!
//! Pure domain model for the verdant greenhouse controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** (binary relay outputs with dependency edges) and
//!   the validated [`DeviceRegistry`](device::DeviceRegistry)
//! - Define **Sensor readings** and the per-tick immutable snapshot
//! - Define **Rules** (threshold / schedule / combined automation votes)
//! - Define **Overrides** (time-bounded manual commands)
//! - Define **Events** (control records and broadcast messages)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod event;
pub mod overrides;
pub mod rule;
pub mod sensor;
