//! Override — a time-bounded manual command that outranks automation.
//!
//! Overrides use lazy expiry: nothing fires when the deadline passes;
//! instead every consultation supplies the per-tick `now` and expired
//! entries are dropped the moment they are observed. A fresh override
//! always replaces an existing one for the same device.

use serde::{Deserialize, Serialize};

use crate::device::DeviceState;
use crate::error::VerdantError;
use crate::id::DeviceId;
use crate::time::Timestamp;

/// A manual command forcing one device into a state until expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub device: DeviceId,
    pub state: DeviceState,
    pub expires_at: Timestamp,
}

impl Override {
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// The set of active manual overrides, keyed by device.
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    entries: std::collections::BTreeMap<DeviceId, Override>,
}

impl OverrideSet {
    /// Install an override, replacing any existing one for the device.
    pub fn set(&mut self, entry: Override) {
        self.entries.insert(entry.device.clone(), entry);
    }

    /// Remove the override for a device.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::NoActiveOverride`] when the device has
    /// none (expired entries count as none).
    pub fn clear(&mut self, device: &DeviceId, now: Timestamp) -> Result<Override, VerdantError> {
        match self.entries.remove(device) {
            Some(entry) if !entry.is_expired(now) => Ok(entry),
            _ => Err(VerdantError::NoActiveOverride {
                device: device.clone(),
            }),
        }
    }

    /// The non-expired override for a device, if any.
    #[must_use]
    pub fn get(&self, device: &DeviceId, now: Timestamp) -> Option<&Override> {
        self.entries
            .get(device)
            .filter(|entry| !entry.is_expired(now))
    }

    /// Drop every entry whose expiry has passed, returning the devices
    /// whose overrides just lapsed.
    pub fn purge_expired(&mut self, now: Timestamp) -> Vec<Override> {
        let lapsed: Vec<DeviceId> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.device.clone())
            .collect();
        lapsed
            .iter()
            .filter_map(|device| self.entries.remove(device))
            .collect()
    }

    /// All non-expired overrides, in deterministic device order.
    pub fn active(&self, now: Timestamp) -> impl Iterator<Item = &Override> {
        self.entries
            .values()
            .filter(move |entry| !entry.is_expired(now))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
