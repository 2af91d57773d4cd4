//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`VerdantError`] via `#[from]`. Rejected commands always carry a
//! specific error kind, never a generic failure.

use crate::id::DeviceId;

/// Umbrella error for the verdant workspace.
#[derive(Debug, thiserror::Error)]
pub enum VerdantError {
    /// Registry or rule-set configuration is invalid. Raised at load
    /// time, before any state mutation.
    #[error("Configuration error")]
    Configuration(#[from] ConfigurationError),

    /// Domain invariant violation on a single object.
    #[error("Validation error")]
    Validation(#[from] ValidationError),

    /// A referenced object does not exist.
    #[error("Not found")]
    NotFound(#[from] NotFoundError),

    /// A relay output could not be driven.
    #[error("Actuation error")]
    Actuation(#[from] ActuationError),

    /// Two requested transitions in one resolution pass contradict
    /// each other.
    #[error("Dependency conflict")]
    Conflict(#[from] DependencyConflict),

    /// Clearing an override on a device that has none.
    #[error("no active override for device '{device}'")]
    NoActiveOverride { device: DeviceId },

    /// The control actor has shut down and can no longer accept
    /// commands.
    #[error("control loop unavailable")]
    ControlUnavailable,
}

/// Fatal configuration problems in the device registry or rule set.
///
/// The previously loaded valid configuration stays active when one of
/// these is returned from a reload.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The `requires` graph contains a cycle involving this device.
    #[error("dependency cycle involving device '{device}'")]
    DependencyCycle { device: DeviceId },

    /// A rule or dependency edge references a device that is not in
    /// the registry.
    #[error("unknown device '{device}' referenced by '{referenced_by}'")]
    UnknownDevice {
        device: DeviceId,
        referenced_by: String,
    },

    /// Two rules share the same name.
    #[error("duplicate rule name '{name}'")]
    DuplicateRuleName { name: String },
}

/// Domain invariant violations on single objects.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Rule name must not be empty.
    #[error("rule name must not be empty")]
    EmptyRuleName,

    /// Threshold rules need at least one condition.
    #[error("rule '{name}' has no conditions")]
    NoConditions { name: String },

    /// Device id must not be empty.
    #[error("device id must not be empty")]
    EmptyDeviceId,
}

/// A referenced object does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{entity} '{id}' not found")]
pub struct NotFoundError {
    /// Human-readable kind, e.g. `"Device"`.
    pub entity: &'static str,
    /// The identifier that failed to resolve.
    pub id: String,
}

/// A relay output call failed or timed out.
///
/// Actuation errors are recorded per device; they never abort unrelated
/// devices in the same plan and are retried only on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActuationError {
    /// The relay driver reported a failure for this device.
    #[error("relay output for '{device}' failed: {reason}")]
    Failed { device: DeviceId, reason: String },

    /// The relay driver did not answer within the step timeout.
    #[error("relay output for '{device}' timed out")]
    TimedOut { device: DeviceId },
}

impl ActuationError {
    /// The device whose output could not be driven.
    #[must_use]
    pub fn device(&self) -> &DeviceId {
        match self {
            Self::Failed { device, .. } | Self::TimedOut { device } => device,
        }
    }
}

/// Two transitions requested in the same resolution pass contradict
/// each other. The whole request is rejected; state is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conflicting transitions for '{device}' (required by '{conflicts_with}')")]
pub struct DependencyConflict {
    /// The device asked to be both ON and OFF.
    pub device: DeviceId,
    /// The device whose transition forced the contradiction.
    pub conflicts_with: DeviceId,
}
