//! In-memory relay bank.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use verdant_app::ports::RelayDriver;
use verdant_domain::device::DeviceState;
use verdant_domain::error::ActuationError;
use verdant_domain::id::DeviceId;

#[derive(Default)]
struct Inner {
    states: BTreeMap<DeviceId, DeviceState>,
    failing: BTreeMap<DeviceId, String>,
    latency: Duration,
}

/// Simulated relay bank.
///
/// Every output starts OFF. Calls record the committed state so tests
/// can assert on it; a device can be scripted to fail, and a global
/// latency can be added to exercise the step timeout.
#[derive(Default)]
pub struct VirtualRelayBank {
    inner: Mutex<Inner>,
}

impl VirtualRelayBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script every future call for this device to fail.
    pub fn fail_on(&self, device: impl Into<DeviceId>, reason: impl Into<String>) {
        self.lock().failing.insert(device.into(), reason.into());
    }

    /// Remove a scripted failure.
    pub fn repair(&self, device: &DeviceId) {
        self.lock().failing.remove(device);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Last committed state for a device. OFF when never driven.
    #[must_use]
    pub fn state_of(&self, device: &DeviceId) -> DeviceState {
        self.lock().states.get(device).copied().unwrap_or_default()
    }

    /// All committed states, in device order.
    #[must_use]
    pub fn states(&self) -> BTreeMap<DeviceId, DeviceState> {
        self.lock().states.clone()
    }
}

impl RelayDriver for VirtualRelayBank {
    fn set_output(
        &self,
        device: &DeviceId,
        state: DeviceState,
    ) -> impl Future<Output = Result<(), ActuationError>> + Send {
        let (latency, result) = {
            let mut inner = self.lock();
            let latency = inner.latency;
            let result = if let Some(reason) = inner.failing.get(device) {
                Err(ActuationError::Failed {
                    device: device.clone(),
                    reason: reason.clone(),
                })
            } else {
                inner.states.insert(device.clone(), state);
                tracing::debug!(device = %device, state = %state, "virtual relay output set");
                Ok(())
            };
            (latency, result)
        };
        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_start_with_every_output_off() {
        let bank = VirtualRelayBank::new();
        assert_eq!(
            bank.state_of(&DeviceId::new("ventilation_main")),
            DeviceState::Off
        );
    }

    #[tokio::test]
    async fn should_record_committed_state() {
        let bank = VirtualRelayBank::new();
        bank.set_output(&DeviceId::new("ventilation_main"), DeviceState::On)
            .await
            .unwrap();
        assert_eq!(
            bank.state_of(&DeviceId::new("ventilation_main")),
            DeviceState::On
        );
    }

    #[tokio::test]
    async fn should_fail_scripted_device_without_touching_state() {
        let bank = VirtualRelayBank::new();
        bank.fail_on("heater", "stuck contact");

        let result = bank
            .set_output(&DeviceId::new("heater"), DeviceState::On)
            .await;

        assert!(matches!(result, Err(ActuationError::Failed { .. })));
        assert_eq!(bank.state_of(&DeviceId::new("heater")), DeviceState::Off);
    }

    #[tokio::test]
    async fn should_succeed_again_after_repair() {
        let bank = VirtualRelayBank::new();
        bank.fail_on("heater", "stuck contact");
        bank.repair(&DeviceId::new("heater"));

        bank.set_output(&DeviceId::new("heater"), DeviceState::On)
            .await
            .unwrap();
        assert_eq!(bank.state_of(&DeviceId::new("heater")), DeviceState::On);
    }
}
