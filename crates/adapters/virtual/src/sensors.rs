//! Deterministic simulated sensor rig.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use verdant_app::ports::{EventPublisher, SensorSource};
use verdant_domain::event::Event;
use verdant_domain::id::SensorId;
use verdant_domain::sensor::{SensorKind, SensorReading, SensorSnapshot};
use verdant_domain::time::now;

/// Description of one simulated sensor.
///
/// Values follow a triangle wave around `base` so runs are reproducible
/// without a random source: the reading depends only on how many times
/// the rig has been advanced.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    pub id: SensorId,
    pub kind: SensorKind,
    pub unit: String,
    pub location: String,
    pub base: f64,
    pub amplitude: f64,
    /// Full wave period, in advances.
    pub period: u64,
}

impl SimulatedSensor {
    fn value_at(&self, step: u64) -> f64 {
        let phase = (step % self.period) as f64 / self.period as f64;
        let wave = if phase < 0.5 {
            4.0 * phase - 1.0
        } else {
            3.0 - 4.0 * phase
        };
        self.base + self.amplitude * wave
    }
}

struct Inner {
    step: u64,
    latest: Option<SensorSnapshot>,
    absent: BTreeSet<SensorKind>,
}

/// Simulated sensor array serving drifting, deterministic readings.
///
/// A kind marked absent disappears from snapshots entirely, which is
/// how tests and demos drive the controller into degraded mode.
pub struct VirtualSensorRig {
    sensors: Vec<SimulatedSensor>,
    inner: Mutex<Inner>,
}

impl Default for VirtualSensorRig {
    fn default() -> Self {
        Self::new(vec![
            SimulatedSensor {
                id: SensorId::new("mcp9808_1"),
                kind: SensorKind::Temperature,
                unit: "°C".to_string(),
                location: "air_high".to_string(),
                base: 24.0,
                amplitude: 3.0,
                period: 60,
            },
            SimulatedSensor {
                id: SensorId::new("sht31_1"),
                kind: SensorKind::Humidity,
                unit: "%".to_string(),
                location: "air_mid".to_string(),
                base: 55.0,
                amplitude: 10.0,
                period: 90,
            },
            SimulatedSensor {
                id: SensorId::new("tsl2561_1"),
                kind: SensorKind::Light,
                unit: "lx".to_string(),
                location: "canopy".to_string(),
                base: 400.0,
                amplitude: 350.0,
                period: 120,
            },
        ])
    }
}

impl VirtualSensorRig {
    #[must_use]
    pub fn new(sensors: Vec<SimulatedSensor>) -> Self {
        Self {
            sensors,
            inner: Mutex::new(Inner {
                step: 0,
                latest: None,
                absent: BTreeSet::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a sensor kind as unavailable; its readings vanish from
    /// subsequent snapshots.
    pub fn set_absent(&self, kind: SensorKind, absent: bool) {
        let mut inner = self.lock();
        if absent {
            inner.absent.insert(kind);
        } else {
            inner.absent.remove(&kind);
        }
    }

    /// Produce the next snapshot and remember it as the latest.
    pub fn advance(&self) -> SensorSnapshot {
        let mut inner = self.lock();
        inner.step += 1;
        let at = now();
        let readings: Vec<SensorReading> = self
            .sensors
            .iter()
            .filter(|sensor| !inner.absent.contains(&sensor.kind))
            .map(|sensor| SensorReading {
                sensor_id: sensor.id.clone(),
                kind: sensor.kind,
                value: sensor.value_at(inner.step),
                unit: sensor.unit.clone(),
                location: sensor.location.clone(),
                recorded_at: at,
            })
            .collect();
        let snapshot = SensorSnapshot::new(at, readings);
        inner.latest = Some(snapshot.clone());
        snapshot
    }

    /// Poll loop: advance at `interval` and publish each reading as a
    /// `sensor_reading` event. Runs until the task is dropped.
    pub async fn run<EP>(&self, publisher: EP, interval: Duration)
    where
        EP: EventPublisher,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let snapshot = self.advance();
            for reading in snapshot.readings() {
                let _ = publisher
                    .publish(Event::SensorReading {
                        sensor_id: reading.sensor_id.clone(),
                        kind: reading.kind,
                        value: reading.value,
                        unit: reading.unit.clone(),
                        recorded_at: reading.recorded_at,
                    })
                    .await;
            }
        }
    }
}

impl SensorSource for VirtualSensorRig {
    fn latest_snapshot(&self) -> impl Future<Output = Option<SensorSnapshot>> + Send {
        let latest = self.lock().latest.clone();
        async move { latest }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_have_no_snapshot_before_first_advance() {
        let rig = VirtualSensorRig::default();
        assert!(rig.latest_snapshot().await.is_none());
    }

    #[tokio::test]
    async fn should_serve_latest_snapshot_after_advance() {
        let rig = VirtualSensorRig::default();
        rig.advance();
        let snapshot = rig.latest_snapshot().await.unwrap();
        assert!(snapshot.has_kind(SensorKind::Temperature));
        assert!(snapshot.has_kind(SensorKind::Humidity));
        assert!(snapshot.has_kind(SensorKind::Light));
    }

    #[test]
    fn should_produce_reproducible_values() {
        let a = VirtualSensorRig::default();
        let b = VirtualSensorRig::default();
        for _ in 0..10 {
            a.advance();
            b.advance();
        }
        let va: Vec<f64> = a.advance().readings().iter().map(|r| r.value).collect();
        let vb: Vec<f64> = b.advance().readings().iter().map(|r| r.value).collect();
        assert_eq!(va, vb);
    }

    #[test]
    fn should_stay_within_amplitude_bounds() {
        let rig = VirtualSensorRig::default();
        for _ in 0..200 {
            let snapshot = rig.advance();
            for reading in snapshot.readings() {
                match reading.kind {
                    SensorKind::Temperature => {
                        assert!((21.0..=27.0).contains(&reading.value));
                    }
                    SensorKind::Humidity => {
                        assert!((45.0..=65.0).contains(&reading.value));
                    }
                    SensorKind::Light => {
                        assert!((50.0..=750.0).contains(&reading.value));
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn should_drop_absent_kind_from_snapshots() {
        let rig = VirtualSensorRig::default();
        rig.set_absent(SensorKind::Temperature, true);
        let snapshot = rig.advance();
        assert!(!snapshot.has_kind(SensorKind::Temperature));
        assert!(snapshot.has_kind(SensorKind::Humidity));

        rig.set_absent(SensorKind::Temperature, false);
        assert!(rig.advance().has_kind(SensorKind::Temperature));
    }
}
