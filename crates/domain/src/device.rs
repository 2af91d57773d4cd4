//! Device — a binary-controllable relay output with dependency edges.
//!
//! Devices declare a `requires` set: every listed device must be ON for
//! this one to be ON. The inverse `required_by` relation is derived by
//! the [`DeviceRegistry`] at load time. The `requires` graph must be
//! acyclic; cycles are a fatal configuration error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ValidationError, VerdantError};
use crate::id::DeviceId;

/// Binary state of a relay output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    On,
    #[default]
    Off,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
        }
    }
}

/// A controllable output as described by configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    /// Human-readable display name, e.g. `"Main Ventilation Fan"`.
    pub name: String,
    /// Devices that must be ON for this device to be ON.
    #[serde(default)]
    pub requires: Vec<DeviceId>,
}

impl Device {
    /// Create a device with no dependencies.
    #[must_use]
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            requires: Vec::new(),
        }
    }

    /// Add a prerequisite device.
    #[must_use]
    pub fn requires(mut self, id: impl Into<DeviceId>) -> Self {
        self.requires.push(id.into());
        self
    }
}

/// Validated, immutable lookup over all controllable devices.
///
/// Construction fails when a dependency edge points at an unknown device
/// or when the `requires` graph contains a cycle.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, Device>,
    required_by: BTreeMap<DeviceId, Vec<DeviceId>>,
}

impl DeviceRegistry {
    /// Build and validate a registry from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::Validation`] for an empty device id and
    /// [`VerdantError::Configuration`] for unknown `requires` references
    /// or dependency cycles.
    pub fn new(devices: Vec<Device>) -> Result<Self, VerdantError> {
        let mut map = BTreeMap::new();
        for device in devices {
            if device.id.as_str().is_empty() {
                return Err(ValidationError::EmptyDeviceId.into());
            }
            map.insert(device.id.clone(), device);
        }

        for device in map.values() {
            for dep in &device.requires {
                if !map.contains_key(dep) {
                    return Err(ConfigurationError::UnknownDevice {
                        device: dep.clone(),
                        referenced_by: device.id.to_string(),
                    }
                    .into());
                }
            }
        }

        let mut required_by: BTreeMap<DeviceId, Vec<DeviceId>> = BTreeMap::new();
        for device in map.values() {
            for dep in &device.requires {
                required_by
                    .entry(dep.clone())
                    .or_default()
                    .push(device.id.clone());
            }
        }

        let registry = Self {
            devices: map,
            required_by,
        };
        registry.check_acyclic()?;
        Ok(registry)
    }

    /// Depth-first walk over `requires`; a back edge means a cycle.
    fn check_acyclic(&self) -> Result<(), ConfigurationError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            registry: &DeviceRegistry,
            id: &DeviceId,
            marks: &mut BTreeMap<DeviceId, Mark>,
        ) -> Result<(), ConfigurationError> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(ConfigurationError::DependencyCycle { device: id.clone() });
                }
                None => {}
            }
            marks.insert(id.clone(), Mark::Visiting);
            if let Some(device) = registry.devices.get(id) {
                for dep in &device.requires {
                    visit(registry, dep, marks)?;
                }
            }
            marks.insert(id.clone(), Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for id in self.devices.keys() {
            visit(self, id, &mut marks)?;
        }
        Ok(())
    }

    /// Look up a device by id.
    #[must_use]
    pub fn get(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    /// All device ids, in deterministic (lexicographic) order.
    pub fn ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.devices.keys()
    }

    /// All devices, in deterministic order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Devices that must be ON before `id` may be ON.
    #[must_use]
    pub fn requires(&self, id: &DeviceId) -> &[DeviceId] {
        self.devices.get(id).map_or(&[], |device| &device.requires)
    }

    /// Devices whose `requires` set includes `id` (must be OFF before
    /// `id` may be turned OFF).
    #[must_use]
    pub fn required_by(&self, id: &DeviceId) -> &[DeviceId] {
        self.required_by.get(id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
