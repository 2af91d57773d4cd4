//! Events — immutable records of what the controller did and why.
//!
//! Two shapes live here. [`ControlEvent`] is the audit record produced
//! exactly once per committed (or failed) transition and handed to the
//! persistence sink. [`Event`] is the broadcast message fanned out to
//! live subscribers (dashboard, tests).

use serde::{Deserialize, Serialize};

use crate::device::DeviceState;
use crate::id::{DeviceId, EventId, SensorId};
use crate::sensor::SensorKind;
use crate::time::Timestamp;

/// What initiated a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Automation,
    Manual,
    ScheduleExpiry,
    EmergencyStop,
    Startup,
    Shutdown,
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Automation => f.write_str("automation"),
            Self::Manual => f.write_str("manual"),
            Self::ScheduleExpiry => f.write_str("schedule_expiry"),
            Self::EmergencyStop => f.write_str("emergency_stop"),
            Self::Startup => f.write_str("startup"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Severity of a control event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    #[default]
    Info,
    Error,
}

/// Audit record for one device transition (or its failure).
///
/// Produced exactly once per committed transition; the only artifact
/// persisted outside the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub device: DeviceId,
    /// The state the transition aimed for.
    pub action: DeviceState,
    pub source: TriggerSource,
    pub severity: EventSeverity,
    /// Human-readable cause, e.g. `"rule 'Cool' voted on"`.
    pub cause: String,
}

impl ControlEvent {
    /// Record a committed transition.
    #[must_use]
    pub fn committed(
        timestamp: Timestamp,
        device: DeviceId,
        action: DeviceState,
        source: TriggerSource,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            timestamp,
            device,
            action,
            source,
            severity: EventSeverity::Info,
            cause: cause.into(),
        }
    }

    /// Record a failed or blocked transition.
    #[must_use]
    pub fn failed(
        timestamp: Timestamp,
        device: DeviceId,
        action: DeviceState,
        source: TriggerSource,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            timestamp,
            device,
            action,
            source,
            severity: EventSeverity::Error,
            cause: cause.into(),
        }
    }
}

/// Broadcast message published to live subscribers.
///
/// One message per change; subscribers may join or leave at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A device transition was committed.
    DeviceStateChanged {
        device: DeviceId,
        state: DeviceState,
        cause: String,
        timestamp: Timestamp,
    },
    /// A sensor produced a fresh reading.
    SensorReading {
        sensor_id: SensorId,
        kind: SensorKind,
        value: f64,
        unit: String,
        recorded_at: Timestamp,
    },
    /// The emergency stop flag flipped.
    EmergencyStopChanged { active: bool },
    /// Automation has been starved of sensor data for several
    /// consecutive ticks; devices hold their last known state.
    DegradedMode { missed_ticks: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_mark_committed_events_as_info() {
        let event = ControlEvent::committed(
            now(),
            DeviceId::new("ventilation_main"),
            DeviceState::On,
            TriggerSource::Automation,
            "rule 'Cool' voted on",
        );
        assert_eq!(event.severity, EventSeverity::Info);
    }

    #[test]
    fn should_mark_failed_events_as_error() {
        let event = ControlEvent::failed(
            now(),
            DeviceId::new("ventilation_main"),
            DeviceState::On,
            TriggerSource::Manual,
            "relay output timed out",
        );
        assert_eq!(event.severity, EventSeverity::Error);
    }

    #[test]
    fn should_assign_unique_ids_to_control_events() {
        let a = ControlEvent::committed(
            now(),
            DeviceId::new("a"),
            DeviceState::On,
            TriggerSource::Startup,
            "",
        );
        let b = ControlEvent::committed(
            now(),
            DeviceId::new("a"),
            DeviceState::On,
            TriggerSource::Startup,
            "",
        );
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn should_tag_device_state_changed_in_json() {
        let event = Event::DeviceStateChanged {
            device: DeviceId::new("led_primary"),
            state: DeviceState::Off,
            cause: "emergency stop".to_string(),
            timestamp: now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "device_state_changed");
        assert_eq!(json["device"], "led_primary");
        assert_eq!(json["state"], "off");
    }

    #[test]
    fn should_tag_emergency_stop_changed_in_json() {
        let event = Event::EmergencyStopChanged { active: true };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "emergency_stop_changed");
        assert_eq!(json["active"], true);
    }

    #[test]
    fn should_roundtrip_events_through_serde_json() {
        let events = vec![
            Event::SensorReading {
                sensor_id: SensorId::new("mcp9808_1"),
                kind: SensorKind::Temperature,
                value: 24.5,
                unit: "°C".to_string(),
                recorded_at: now(),
            },
            Event::DegradedMode { missed_ticks: 5 },
        ];
        for event in &events {
            let json = serde_json::to_string(event).unwrap();
            let parsed: Event = serde_json::from_str(&json).unwrap();
            assert_eq!(&parsed, event);
        }
    }
}
