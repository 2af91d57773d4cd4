//! Relay driver port — the abstract "set output" capability.
//!
//! The core trusts implementations to be idempotent and fast. The
//! control actor never issues two concurrent calls for the same device;
//! a call that exceeds the actor's step timeout is treated as a failed
//! step and retried only on the next tick.

use std::future::Future;

use verdant_domain::device::DeviceState;
use verdant_domain::error::ActuationError;
use verdant_domain::id::DeviceId;

/// Drives physical (or simulated) relay outputs.
pub trait RelayDriver {
    /// Commit one device to the given state.
    ///
    /// # Errors
    ///
    /// Returns [`ActuationError`] when the output could not be driven.
    fn set_output(
        &self,
        device: &DeviceId,
        state: DeviceState,
    ) -> impl Future<Output = Result<(), ActuationError>> + Send;
}

impl<T: RelayDriver + Send + Sync> RelayDriver for std::sync::Arc<T> {
    fn set_output(
        &self,
        device: &DeviceId,
        state: DeviceState,
    ) -> impl Future<Output = Result<(), ActuationError>> + Send {
        (**self).set_output(device, state)
    }
}
