//! Override & safety manager — masks automation votes.
//!
//! Precedence, highest first: emergency stop (forces every device OFF
//! and suppresses all other evaluation), non-expired manual overrides,
//! automation votes, retain-current-state. Expiry is checked against a
//! single per-tick `now` so every device sees a consistent instant.

use std::collections::BTreeMap;

use verdant_domain::device::{DeviceRegistry, DeviceState};
use verdant_domain::event::TriggerSource;
use verdant_domain::id::DeviceId;
use verdant_domain::overrides::OverrideSet;
use verdant_domain::time::Timestamp;

use crate::engine::Vote;

/// A fully resolved target for one device, with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub state: DeviceState,
    pub source: TriggerSource,
    pub cause: String,
}

/// Resolve final per-device targets from votes, overrides, and the
/// emergency-stop flag.
///
/// Devices absent from the result keep their current state. Clearing
/// emergency stop is not handled here: the next tick simply
/// re-evaluates from scratch, so nothing "snaps back".
#[must_use]
pub fn apply(
    registry: &DeviceRegistry,
    votes: &BTreeMap<DeviceId, Vote>,
    overrides: &OverrideSet,
    emergency_stop: bool,
    now: Timestamp,
) -> BTreeMap<DeviceId, ResolvedTarget> {
    if emergency_stop {
        return registry
            .ids()
            .map(|device| {
                (
                    device.clone(),
                    ResolvedTarget {
                        state: DeviceState::Off,
                        source: TriggerSource::EmergencyStop,
                        cause: "emergency stop active".to_string(),
                    },
                )
            })
            .collect();
    }

    let mut targets = BTreeMap::new();
    for device in registry.ids() {
        if let Some(entry) = overrides.get(device, now) {
            targets.insert(
                device.clone(),
                ResolvedTarget {
                    state: entry.state,
                    source: TriggerSource::Manual,
                    cause: format!(
                        "manual override until {}",
                        entry.expires_at.format("%Y-%m-%dT%H:%M:%SZ")
                    ),
                },
            );
        } else if let Some(vote) = votes.get(device) {
            targets.insert(
                device.clone(),
                ResolvedTarget {
                    state: vote.state,
                    source: TriggerSource::Automation,
                    cause: format!("rule '{}' voted {}", vote.rule, vote.state),
                },
            );
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use verdant_domain::device::Device;
    use verdant_domain::overrides::Override;
    use verdant_domain::time::now;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(vec![
            Device::new("ventilation_main", "Fan"),
            Device::new("led_primary", "LEDs"),
        ])
        .unwrap()
    }

    fn vote_on(rule: &str) -> Vote {
        Vote {
            state: DeviceState::On,
            rule: rule.to_string(),
            priority: 0,
        }
    }

    #[test]
    fn should_force_every_device_off_under_emergency_stop() {
        let registry = registry();
        let mut votes = BTreeMap::new();
        votes.insert(DeviceId::new("ventilation_main"), vote_on("Cool"));
        let mut overrides = OverrideSet::default();
        overrides.set(Override {
            device: DeviceId::new("led_primary"),
            state: DeviceState::On,
            expires_at: now() + Duration::seconds(600),
        });

        let targets = apply(&registry, &votes, &overrides, true, now());

        assert_eq!(targets.len(), registry.len());
        for target in targets.values() {
            assert_eq!(target.state, DeviceState::Off);
            assert_eq!(target.source, TriggerSource::EmergencyStop);
        }
    }

    #[test]
    fn should_let_override_beat_opposing_automation_vote() {
        let registry = registry();
        let mut votes = BTreeMap::new();
        votes.insert(
            DeviceId::new("ventilation_main"),
            Vote {
                state: DeviceState::Off,
                rule: "Night".to_string(),
                priority: 10,
            },
        );
        let mut overrides = OverrideSet::default();
        overrides.set(Override {
            device: DeviceId::new("ventilation_main"),
            state: DeviceState::On,
            expires_at: now() + Duration::seconds(60),
        });

        let targets = apply(&registry, &votes, &overrides, false, now());
        let target = targets.get(&DeviceId::new("ventilation_main")).unwrap();
        assert_eq!(target.state, DeviceState::On);
        assert_eq!(target.source, TriggerSource::Manual);
    }

    #[test]
    fn should_use_automation_vote_once_override_expired() {
        let registry = registry();
        let mut votes = BTreeMap::new();
        votes.insert(
            DeviceId::new("ventilation_main"),
            Vote {
                state: DeviceState::Off,
                rule: "Night".to_string(),
                priority: 0,
            },
        );
        let mut overrides = OverrideSet::default();
        overrides.set(Override {
            device: DeviceId::new("ventilation_main"),
            state: DeviceState::On,
            expires_at: now() + Duration::seconds(60),
        });

        // 61 seconds later the override has lapsed.
        let later = now() + Duration::seconds(61);
        let targets = apply(&registry, &votes, &overrides, false, later);
        let target = targets.get(&DeviceId::new("ventilation_main")).unwrap();
        assert_eq!(target.state, DeviceState::Off);
        assert_eq!(target.source, TriggerSource::Automation);
    }

    #[test]
    fn should_retain_current_state_without_vote_or_override() {
        let registry = registry();
        let targets = apply(
            &registry,
            &BTreeMap::new(),
            &OverrideSet::default(),
            false,
            now(),
        );
        assert!(targets.is_empty());
    }

    #[test]
    fn should_name_winning_rule_in_cause() {
        let registry = registry();
        let mut votes = BTreeMap::new();
        votes.insert(DeviceId::new("ventilation_main"), vote_on("Cool"));

        let targets = apply(&registry, &votes, &OverrideSet::default(), false, now());
        let target = targets.get(&DeviceId::new("ventilation_main")).unwrap();
        assert_eq!(target.cause, "rule 'Cool' voted on");
    }
}
