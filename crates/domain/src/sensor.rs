//! Sensor readings and the per-tick immutable snapshot.
//!
//! The core never talks to sensor hardware. Readings arrive already
//! parsed (kind, value, unit, location, timestamp) and are grouped into
//! a [`SensorSnapshot`] once per control-loop tick. All rules in a tick
//! evaluate against the same snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::SensorId;
use crate::time::Timestamp;

/// The kind of physical quantity a sensor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Light,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temperature => f.write_str("temperature"),
            Self::Humidity => f.write_str("humidity"),
            Self::Light => f.write_str("light"),
        }
    }
}

/// One parsed measurement from a single sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: SensorId,
    pub kind: SensorKind,
    pub value: f64,
    /// Measurement unit, e.g. `"°C"`, `"%"`, `"lux"`.
    pub unit: String,
    /// Physical placement, e.g. `"air_high"`, `"canopy"`.
    pub location: String,
    pub recorded_at: Timestamp,
}

/// Immutable, timestamped set of the latest readings.
///
/// Produced once per tick and consumed read-only by every rule in that
/// tick. Multiple readings of the same kind (e.g. three temperature
/// probes) are all retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    taken_at: Timestamp,
    readings: Vec<SensorReading>,
}

impl SensorSnapshot {
    /// Group readings into a snapshot taken at the given instant.
    #[must_use]
    pub fn new(taken_at: Timestamp, readings: Vec<SensorReading>) -> Self {
        Self { taken_at, readings }
    }

    #[must_use]
    pub fn taken_at(&self) -> Timestamp {
        self.taken_at
    }

    #[must_use]
    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    /// All values measured for a given kind. Empty when the kind is
    /// absent from this snapshot.
    pub fn values_of(&self, kind: SensorKind) -> impl Iterator<Item = f64> + '_ {
        self.readings
            .iter()
            .filter(move |reading| reading.kind == kind)
            .map(|reading| reading.value)
    }

    /// Whether at least one reading of the kind is present.
    #[must_use]
    pub fn has_kind(&self, kind: SensorKind) -> bool {
        self.readings.iter().any(|reading| reading.kind == kind)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Latest reading per sensor id, for status displays.
    #[must_use]
    pub fn by_sensor(&self) -> BTreeMap<&SensorId, &SensorReading> {
        let mut map = BTreeMap::new();
        for reading in &self.readings {
            map.entry(&reading.sensor_id)
                .and_modify(|current: &mut &SensorReading| {
                    if reading.recorded_at > current.recorded_at {
                        *current = reading;
                    }
                })
                .or_insert(reading);
        }
        map
    }
}
