//! Control actor — single writer of the authoritative device state.
//!
//! All mutation flows through one task: the periodic tick and every
//! asynchronous command are serialized over an mpsc channel, so device
//! states, overrides, and the emergency-stop flag never see concurrent
//! writers. Commands that change overrides or the emergency stop
//! short-circuit into the same resolution pipeline the tick uses
//! instead of waiting for the next tick.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use verdant_domain::device::{DeviceRegistry, DeviceState};
use verdant_domain::error::{ActuationError, NotFoundError, VerdantError};
use verdant_domain::event::{ControlEvent, Event, TriggerSource};
use verdant_domain::id::DeviceId;
use verdant_domain::overrides::{Override, OverrideSet};
use verdant_domain::rule::{Rule, validate_rules};
use verdant_domain::sensor::{SensorKind, SensorSnapshot};
use verdant_domain::time::{Timestamp, now};

use crate::engine;
use crate::ports::{EventPublisher, EventSink, RelayDriver, SensorSource};
use crate::resolver::{self, PlanStep};
use crate::safety::{self, ResolvedTarget};

const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Timing and safety knobs for the control loop.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Cadence of the evaluate-resolve-actuate cycle.
    pub tick_interval: Duration,
    /// Budget for a single relay output call; a step past this is a
    /// failed step.
    pub step_timeout: Duration,
    /// Consecutive sensor-starved ticks before degraded mode is
    /// announced.
    pub degraded_after_misses: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            step_timeout: Duration::from_secs(2),
            degraded_after_misses: 5,
        }
    }
}

/// Point-in-time view of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub id: DeviceId,
    pub name: String,
    pub state: DeviceState,
}

/// Point-in-time view of one active override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideStatus {
    pub device: DeviceId,
    pub state: DeviceState,
    pub expires_at: Timestamp,
}

/// Snapshot of the controller state, as served over the API and as the
/// first frame of every event-stream subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub devices: Vec<DeviceStatus>,
    pub emergency_stop: bool,
    pub degraded: bool,
    pub overrides: Vec<OverrideStatus>,
}

enum Command {
    Status {
        reply: oneshot::Sender<Status>,
    },
    SetOverride {
        device: DeviceId,
        state: DeviceState,
        ttl: Duration,
        reply: oneshot::Sender<Result<(), VerdantError>>,
    },
    ClearOverride {
        device: DeviceId,
        reply: oneshot::Sender<Result<(), VerdantError>>,
    },
    SetEmergencyStop {
        active: bool,
        reply: oneshot::Sender<()>,
    },
    ReloadRules {
        rules: Vec<Rule>,
        reply: oneshot::Sender<Result<(), VerdantError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle for talking to the control actor.
#[derive(Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<Command>,
}

impl ControlHandle {
    /// Current controller status.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::ControlUnavailable`] when the actor has
    /// shut down.
    pub async fn status(&self) -> Result<Status, VerdantError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Status { reply })
            .await
            .map_err(|_| VerdantError::ControlUnavailable)?;
        rx.await.map_err(|_| VerdantError::ControlUnavailable)
    }

    /// Force a device into a state for `ttl`, outranking automation.
    ///
    /// The override is actuated immediately, not on the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::NotFound`] for an unknown device and
    /// [`VerdantError::ControlUnavailable`] when the actor has shut
    /// down.
    pub async fn set_override(
        &self,
        device: DeviceId,
        state: DeviceState,
        ttl: Duration,
    ) -> Result<(), VerdantError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SetOverride {
                device,
                state,
                ttl,
                reply,
            })
            .await
            .map_err(|_| VerdantError::ControlUnavailable)?;
        rx.await.map_err(|_| VerdantError::ControlUnavailable)?
    }

    /// Remove the override for a device, returning it to automation.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::NoActiveOverride`] when the device has
    /// none and [`VerdantError::ControlUnavailable`] when the actor has
    /// shut down.
    pub async fn clear_override(&self, device: DeviceId) -> Result<(), VerdantError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ClearOverride { device, reply })
            .await
            .map_err(|_| VerdantError::ControlUnavailable)?;
        rx.await.map_err(|_| VerdantError::ControlUnavailable)?
    }

    /// Engage or clear the emergency stop. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::ControlUnavailable`] when the actor has
    /// shut down.
    pub async fn set_emergency_stop(&self, active: bool) -> Result<(), VerdantError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SetEmergencyStop { active, reply })
            .await
            .map_err(|_| VerdantError::ControlUnavailable)?;
        rx.await.map_err(|_| VerdantError::ControlUnavailable)
    }

    /// Replace the active rule set.
    ///
    /// The new set is validated against the registry first; on any
    /// error the previous set stays active. No actuation happens here,
    /// the next tick applies the new rules.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::Configuration`] or
    /// [`VerdantError::Validation`] for a bad rule set and
    /// [`VerdantError::ControlUnavailable`] when the actor has shut
    /// down.
    pub async fn reload_rules(&self, rules: Vec<Rule>) -> Result<(), VerdantError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ReloadRules { rules, reply })
            .await
            .map_err(|_| VerdantError::ControlUnavailable)?;
        rx.await.map_err(|_| VerdantError::ControlUnavailable)?
    }

    /// Stop the actor, forcing every output OFF first.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::ControlUnavailable`] when the actor has
    /// already shut down.
    pub async fn shutdown(&self) -> Result<(), VerdantError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| VerdantError::ControlUnavailable)?;
        rx.await.map_err(|_| VerdantError::ControlUnavailable)
    }
}

/// The control loop state machine.
///
/// Owns the registry, the active rule set, the authoritative device
/// states, the override set, and the emergency-stop flag. Everything
/// else reaches it through a [`ControlHandle`].
pub struct ControlActor<RD, SS, EP, ES> {
    config: ControlConfig,
    registry: DeviceRegistry,
    rules: Vec<Rule>,
    relay: RD,
    sensors: SS,
    publisher: EP,
    sink: ES,
    states: BTreeMap<DeviceId, DeviceState>,
    overrides: OverrideSet,
    emergency_stop: bool,
    missed_ticks: u32,
    degraded: bool,
}

impl<RD, SS, EP, ES> ControlActor<RD, SS, EP, ES>
where
    RD: RelayDriver + Send + 'static,
    SS: SensorSource + Send + 'static,
    EP: EventPublisher + Send + 'static,
    ES: EventSink + Send + 'static,
{
    /// Build the actor, validating the rule set against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::Configuration`] or
    /// [`VerdantError::Validation`] when the rule set is invalid.
    pub fn new(
        config: ControlConfig,
        registry: DeviceRegistry,
        rules: Vec<Rule>,
        relay: RD,
        sensors: SS,
        publisher: EP,
        sink: ES,
    ) -> Result<Self, VerdantError> {
        validate_rules(&rules, &registry)?;
        let states = registry
            .ids()
            .map(|device| (device.clone(), DeviceState::Off))
            .collect();
        Ok(Self {
            config,
            registry,
            rules,
            relay,
            sensors,
            publisher,
            sink,
            states,
            overrides: OverrideSet::default(),
            emergency_stop: false,
            missed_ticks: 0,
            degraded: false,
        })
    }

    /// Spawn the control loop onto the tokio runtime.
    #[must_use]
    pub fn spawn(self) -> ControlHandle {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        tokio::spawn(self.run(rx));
        ControlHandle { commands }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.force_all_off(TriggerSource::Startup, "initialization forces outputs off")
            .await;

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut shutdown_ack = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Some(ack) = self.handle(command).await {
                            shutdown_ack = Some(ack);
                            break;
                        }
                    }
                    None => break,
                }
            }
        }

        self.force_all_off(TriggerSource::Shutdown, "shutdown forces outputs off")
            .await;
        tracing::info!("control loop stopped");
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    /// Process one command. Returns the acknowledgement channel when
    /// the command asks the loop to stop.
    async fn handle(&mut self, command: Command) -> Option<oneshot::Sender<()>> {
        match command {
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::SetOverride {
                device,
                state,
                ttl,
                reply,
            } => {
                let result = self.set_override(device, state, ttl).await;
                let _ = reply.send(result);
            }
            Command::ClearOverride { device, reply } => {
                let result = self.clear_override(device).await;
                let _ = reply.send(result);
            }
            Command::SetEmergencyStop { active, reply } => {
                self.set_emergency_stop(active).await;
                let _ = reply.send(());
            }
            Command::ReloadRules { rules, reply } => {
                let _ = reply.send(self.reload_rules(rules));
            }
            Command::Shutdown { reply } => return Some(reply),
        }
        None
    }

    fn status(&self) -> Status {
        let at = now();
        Status {
            devices: self
                .registry
                .devices()
                .map(|device| DeviceStatus {
                    id: device.id.clone(),
                    name: device.name.clone(),
                    state: self.states.get(&device.id).copied().unwrap_or_default(),
                })
                .collect(),
            emergency_stop: self.emergency_stop,
            degraded: self.degraded,
            overrides: self
                .overrides
                .active(at)
                .map(|entry| OverrideStatus {
                    device: entry.device.clone(),
                    state: entry.state,
                    expires_at: entry.expires_at,
                })
                .collect(),
        }
    }

    async fn set_override(
        &mut self,
        device: DeviceId,
        state: DeviceState,
        ttl: Duration,
    ) -> Result<(), VerdantError> {
        if !self.registry.contains(&device) {
            return Err(NotFoundError {
                entity: "Device",
                id: device.to_string(),
            }
            .into());
        }
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = now()
            .checked_add_signed(ttl)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        tracing::info!(device = %device, state = %state, expires_at = %expires_at, "manual override set");
        self.overrides.set(Override {
            device,
            state,
            expires_at,
        });
        self.resync(TriggerSource::Manual).await;
        Ok(())
    }

    async fn clear_override(&mut self, device: DeviceId) -> Result<(), VerdantError> {
        let cleared = self.overrides.clear(&device, now())?;
        tracing::info!(device = %cleared.device, "manual override cleared");
        self.resync(TriggerSource::Manual).await;
        Ok(())
    }

    async fn set_emergency_stop(&mut self, active: bool) {
        if self.emergency_stop == active {
            return;
        }
        self.emergency_stop = active;
        if active {
            tracing::warn!("emergency stop engaged");
        } else {
            tracing::info!("emergency stop cleared, re-evaluating from scratch");
        }
        let _ = self
            .publisher
            .publish(Event::EmergencyStopChanged { active })
            .await;
        self.resync(TriggerSource::EmergencyStop).await;
    }

    fn reload_rules(&mut self, rules: Vec<Rule>) -> Result<(), VerdantError> {
        validate_rules(&rules, &self.registry)?;
        tracing::info!(count = rules.len(), "rule set replaced");
        self.rules = rules;
        Ok(())
    }

    async fn tick(&mut self) {
        let snapshot = self.sensors.latest_snapshot().await;
        self.track_degraded(snapshot.as_ref()).await;
        self.evaluate_and_apply(snapshot, TriggerSource::Automation)
            .await;
    }

    /// Re-run the resolution pipeline outside the tick cadence, after a
    /// command changed overrides or the emergency stop.
    async fn resync(&mut self, fallback: TriggerSource) {
        let snapshot = self.sensors.latest_snapshot().await;
        self.evaluate_and_apply(snapshot, fallback).await;
    }

    async fn evaluate_and_apply(
        &mut self,
        snapshot: Option<SensorSnapshot>,
        fallback: TriggerSource,
    ) {
        let at = now();
        let local_time = Local::now().time();

        let lapsed: BTreeSet<DeviceId> = self
            .overrides
            .purge_expired(at)
            .into_iter()
            .map(|entry| {
                tracing::info!(device = %entry.device, "manual override expired");
                entry.device
            })
            .collect();

        // An entirely absent snapshot makes every rule abstain; devices
        // hold their last state until data comes back.
        let votes = match &snapshot {
            Some(snapshot) => engine::evaluate(&self.rules, snapshot, local_time),
            None => BTreeMap::new(),
        };

        let targets = safety::apply(
            &self.registry,
            &votes,
            &self.overrides,
            self.emergency_stop,
            at,
        );
        self.apply_targets(&targets, &lapsed, fallback).await;
    }

    async fn apply_targets(
        &mut self,
        targets: &BTreeMap<DeviceId, ResolvedTarget>,
        lapsed: &BTreeSet<DeviceId>,
        fallback: TriggerSource,
    ) {
        let wanted: BTreeMap<DeviceId, DeviceState> = targets
            .iter()
            .map(|(device, target)| (device.clone(), target.state))
            .collect();

        let plan = match resolver::resolve(&self.registry, &self.states, &wanted) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::error!(error = %err, "resolution rejected, no outputs changed");
                if let VerdantError::Conflict(conflict) = &err {
                    let action = wanted.get(&conflict.device).copied().unwrap_or_default();
                    self.sink
                        .persist(ControlEvent::failed(
                            now(),
                            conflict.device.clone(),
                            action,
                            fallback,
                            err.to_string(),
                        ))
                        .await;
                }
                return;
            }
        };

        // Devices blocked by an earlier failed step, mapped to the
        // device that failed.
        let mut blocked: BTreeMap<DeviceId, DeviceId> = BTreeMap::new();
        for (index, step) in plan.iter().enumerate() {
            let (source, cause) = attribution(step, targets, lapsed, fallback);
            if let Some(failed) = blocked.get(&step.device) {
                self.sink
                    .persist(ControlEvent::failed(
                        now(),
                        step.device.clone(),
                        step.state,
                        source,
                        format!("blocked by failed transition of '{failed}'"),
                    ))
                    .await;
                continue;
            }
            if self.commit(&step.device, step.state, source, cause).await.is_err() {
                for dependent in resolver::downstream_of(&self.registry, &plan[index + 1..], step) {
                    blocked
                        .entry(dependent.device.clone())
                        .or_insert_with(|| step.device.clone());
                }
            }
        }
    }

    /// Drive one output and record the outcome.
    ///
    /// A committed step always produces an audit [`ControlEvent`]; the
    /// broadcast [`Event::DeviceStateChanged`] only goes out when the
    /// authoritative state actually changed, so forcing an already-OFF
    /// device stays silent on the live stream.
    async fn commit(
        &mut self,
        device: &DeviceId,
        state: DeviceState,
        source: TriggerSource,
        cause: String,
    ) -> Result<(), ActuationError> {
        let timestamp = now();
        let result = match tokio::time::timeout(
            self.config.step_timeout,
            self.relay.set_output(device, state),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ActuationError::TimedOut {
                device: device.clone(),
            }),
        };

        match result {
            Ok(()) => {
                let changed = self.states.get(device).copied().unwrap_or_default() != state;
                self.states.insert(device.clone(), state);
                tracing::info!(device = %device, state = %state, source = %source, "output committed");
                self.sink
                    .persist(ControlEvent::committed(
                        timestamp,
                        device.clone(),
                        state,
                        source,
                        cause.clone(),
                    ))
                    .await;
                if changed {
                    let _ = self
                        .publisher
                        .publish(Event::DeviceStateChanged {
                            device: device.clone(),
                            state,
                            cause,
                            timestamp,
                        })
                        .await;
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(device = %device, state = %state, error = %err, "output failed");
                self.sink
                    .persist(ControlEvent::failed(
                        timestamp,
                        device.clone(),
                        state,
                        source,
                        err.to_string(),
                    ))
                    .await;
                Err(err)
            }
        }
    }

    async fn force_all_off(&mut self, source: TriggerSource, cause: &str) {
        let devices: Vec<DeviceId> = self.registry.ids().cloned().collect();
        for device in devices {
            // Failures are recorded per device and do not stop the
            // sweep.
            let _ = self
                .commit(&device, DeviceState::Off, source, cause.to_string())
                .await;
        }
    }

    /// Count consecutive ticks on which every sensor kind the active
    /// rules need was absent. Announce degraded mode once past the
    /// threshold; a single tick with data re-arms the counter.
    async fn track_degraded(&mut self, snapshot: Option<&SensorSnapshot>) {
        let required: BTreeSet<SensorKind> = self
            .rules
            .iter()
            .filter(|rule| rule.active)
            .flat_map(Rule::required_kinds)
            .collect();
        if required.is_empty() {
            self.missed_ticks = 0;
            self.degraded = false;
            return;
        }

        let starved = match snapshot {
            None => true,
            Some(snapshot) => required.iter().all(|kind| !snapshot.has_kind(*kind)),
        };
        if starved {
            self.missed_ticks = self.missed_ticks.saturating_add(1);
            if self.missed_ticks >= self.config.degraded_after_misses && !self.degraded {
                self.degraded = true;
                tracing::warn!(
                    missed_ticks = self.missed_ticks,
                    "automation starved of sensor data, entering degraded mode"
                );
                let _ = self
                    .publisher
                    .publish(Event::DegradedMode {
                        missed_ticks: self.missed_ticks,
                    })
                    .await;
            }
        } else {
            if self.degraded {
                tracing::info!("sensor data recovered, leaving degraded mode");
            }
            self.missed_ticks = 0;
            self.degraded = false;
        }
    }
}

/// Provenance for one plan step. Steps pulled in purely as dependency
/// adjustments carry the pass's fallback source; transitions on devices
/// whose override lapsed this pass are attributed to the expiry.
fn attribution(
    step: &PlanStep,
    targets: &BTreeMap<DeviceId, ResolvedTarget>,
    lapsed: &BTreeSet<DeviceId>,
    fallback: TriggerSource,
) -> (TriggerSource, String) {
    match targets.get(&step.device) {
        Some(target) if lapsed.contains(&step.device) && target.source == TriggerSource::Automation => {
            (
                TriggerSource::ScheduleExpiry,
                format!("override expired; {}", target.cause),
            )
        }
        Some(target) => (target.source, target.cause.clone()),
        None => (fallback, "required by a dependent transition".to_string()),
    }
}
