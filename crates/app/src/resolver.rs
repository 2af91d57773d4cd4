//! Dependency resolver — expands requested targets into a safe plan.
//!
//! Given the registry, the current device states, and a set of
//! requested target states, the resolver produces a total order of
//! single-device transitions that preserves both dependency invariants:
//! prerequisites are ON before their dependents turn ON, and dependents
//! are OFF before their prerequisite turns OFF. Contradictory requests
//! are rejected wholesale with a [`DependencyConflict`]; the resolver
//! never guesses and never partially satisfies a request.

use std::collections::BTreeMap;

use verdant_domain::device::{DeviceRegistry, DeviceState};
use verdant_domain::error::{DependencyConflict, NotFoundError, VerdantError};
use verdant_domain::id::DeviceId;

/// One transition in an ordered plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub device: DeviceId,
    pub state: DeviceState,
}

struct Planner<'a> {
    registry: &'a DeviceRegistry,
    current: &'a BTreeMap<DeviceId, DeviceState>,
    targets: &'a BTreeMap<DeviceId, DeviceState>,
    /// States this plan has committed to, including devices that keep
    /// their current state but are load-bearing for another step.
    planned: BTreeMap<DeviceId, DeviceState>,
    order: Vec<PlanStep>,
}

impl Planner<'_> {
    fn current_state(&self, device: &DeviceId) -> DeviceState {
        self.current.get(device).copied().unwrap_or_default()
    }

    /// Ensure `device` ends up ON, recursively raising prerequisites
    /// first so their steps precede this one.
    fn plan_on(&mut self, device: &DeviceId, wanted_by: &DeviceId) -> Result<(), VerdantError> {
        match self.planned.get(device) {
            Some(DeviceState::On) => return Ok(()),
            Some(DeviceState::Off) => {
                return Err(DependencyConflict {
                    device: device.clone(),
                    conflicts_with: wanted_by.clone(),
                }
                .into());
            }
            None => {}
        }
        if device != wanted_by && self.targets.get(device) == Some(&DeviceState::Off) {
            return Err(DependencyConflict {
                device: device.clone(),
                conflicts_with: wanted_by.clone(),
            }
            .into());
        }

        self.planned.insert(device.clone(), DeviceState::On);
        for prerequisite in self.registry.requires(device).to_vec() {
            self.plan_on(&prerequisite, device)?;
        }
        if self.current_state(device) != DeviceState::On {
            self.order.push(PlanStep {
                device: device.clone(),
                state: DeviceState::On,
            });
        }
        Ok(())
    }

    /// Ensure `device` ends up OFF, recursively lowering dependents
    /// first so their steps precede this one.
    fn plan_off(&mut self, device: &DeviceId, wanted_by: &DeviceId) -> Result<(), VerdantError> {
        match self.planned.get(device) {
            Some(DeviceState::Off) => return Ok(()),
            Some(DeviceState::On) => {
                return Err(DependencyConflict {
                    device: device.clone(),
                    conflicts_with: wanted_by.clone(),
                }
                .into());
            }
            None => {}
        }
        if device != wanted_by && self.targets.get(device) == Some(&DeviceState::On) {
            return Err(DependencyConflict {
                device: device.clone(),
                conflicts_with: wanted_by.clone(),
            }
            .into());
        }

        self.planned.insert(device.clone(), DeviceState::Off);
        for dependent in self.registry.required_by(device).to_vec() {
            if self.current_state(&dependent) == DeviceState::On
                || self.planned.get(&dependent) == Some(&DeviceState::On)
            {
                self.plan_off(&dependent, device)?;
            }
        }
        if self.current_state(device) != DeviceState::Off {
            self.order.push(PlanStep {
                device: device.clone(),
                state: DeviceState::Off,
            });
        }
        Ok(())
    }
}

/// Expand requested targets into an ordered, dependency-safe plan.
///
/// Devices already in their target state produce no step but still pin
/// that state for conflict detection. The returned order applies ON
/// steps after their prerequisites and OFF steps before theirs.
///
/// # Errors
///
/// Returns [`VerdantError::NotFound`] for a target on an unknown device
/// and [`VerdantError::Conflict`] when two transitions in this pass
/// contradict each other; in both cases no plan is produced and state
/// is left untouched.
pub fn resolve(
    registry: &DeviceRegistry,
    current: &BTreeMap<DeviceId, DeviceState>,
    targets: &BTreeMap<DeviceId, DeviceState>,
) -> Result<Vec<PlanStep>, VerdantError> {
    for device in targets.keys() {
        if !registry.contains(device) {
            return Err(NotFoundError {
                entity: "Device",
                id: device.to_string(),
            }
            .into());
        }
    }

    let mut planner = Planner {
        registry,
        current,
        targets,
        planned: BTreeMap::new(),
        order: Vec::new(),
    };

    for (device, state) in targets {
        match state {
            DeviceState::On => planner.plan_on(device, device)?,
            DeviceState::Off => planner.plan_off(device, device)?,
        }
    }

    Ok(planner.order)
}

/// Devices whose planned step can no longer run because an earlier step
/// for `failed` did not commit.
///
/// A step depends on the failed one when it turns a device ON whose
/// `requires` chain includes the failed device, or turns a device OFF
/// whose `required_by` chain does. Independent steps are unaffected.
#[must_use]
pub fn downstream_of<'a>(
    registry: &DeviceRegistry,
    remaining: &'a [PlanStep],
    failed: &PlanStep,
) -> Vec<&'a PlanStep> {
    remaining
        .iter()
        .filter(|step| match step.state {
            DeviceState::On => chain_contains(registry, &step.device, &failed.device, true),
            DeviceState::Off => chain_contains(registry, &step.device, &failed.device, false),
        })
        .collect()
}

fn chain_contains(
    registry: &DeviceRegistry,
    from: &DeviceId,
    needle: &DeviceId,
    follow_requires: bool,
) -> bool {
    let edges = if follow_requires {
        registry.requires(from)
    } else {
        registry.required_by(from)
    };
    edges
        .iter()
        .any(|next| next == needle || chain_contains(registry, next, needle, follow_requires))
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_domain::device::Device;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(vec![
            Device::new("ventilation_1", "Ventilation"),
            Device::new("led_1", "Grow LEDs").requires("ventilation_1"),
        ])
        .unwrap()
    }

    fn states(pairs: &[(&str, DeviceState)]) -> BTreeMap<DeviceId, DeviceState> {
        pairs
            .iter()
            .map(|(id, state)| (DeviceId::new(*id), *state))
            .collect()
    }

    #[test]
    fn should_raise_prerequisite_before_dependent() {
        // led_1 requires ventilation_1, which is OFF.
        let current = states(&[
            ("ventilation_1", DeviceState::Off),
            ("led_1", DeviceState::Off),
        ]);
        let targets = states(&[("led_1", DeviceState::On)]);

        let plan = resolve(&registry(), &current, &targets).unwrap();
        assert_eq!(
            plan,
            vec![
                PlanStep {
                    device: DeviceId::new("ventilation_1"),
                    state: DeviceState::On
                },
                PlanStep {
                    device: DeviceId::new("led_1"),
                    state: DeviceState::On
                },
            ]
        );
    }

    #[test]
    fn should_lower_dependent_before_prerequisite() {
        let current = states(&[
            ("ventilation_1", DeviceState::On),
            ("led_1", DeviceState::On),
        ]);
        let targets = states(&[("ventilation_1", DeviceState::Off)]);

        let plan = resolve(&registry(), &current, &targets).unwrap();
        assert_eq!(
            plan,
            vec![
                PlanStep {
                    device: DeviceId::new("led_1"),
                    state: DeviceState::Off
                },
                PlanStep {
                    device: DeviceId::new("ventilation_1"),
                    state: DeviceState::Off
                },
            ]
        );
    }

    #[test]
    fn should_skip_prerequisite_already_on() {
        let current = states(&[
            ("ventilation_1", DeviceState::On),
            ("led_1", DeviceState::Off),
        ]);
        let targets = states(&[("led_1", DeviceState::On)]);

        let plan = resolve(&registry(), &current, &targets).unwrap();
        assert_eq!(
            plan,
            vec![PlanStep {
                device: DeviceId::new("led_1"),
                state: DeviceState::On
            }]
        );
    }

    #[test]
    fn should_produce_empty_plan_for_no_op_targets() {
        let current = states(&[
            ("ventilation_1", DeviceState::On),
            ("led_1", DeviceState::On),
        ]);
        let targets = states(&[("led_1", DeviceState::On)]);

        let plan = resolve(&registry(), &current, &targets).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn should_reject_conflicting_explicit_targets() {
        // led_1 must be ON but its prerequisite is asked to go OFF.
        let current = states(&[
            ("ventilation_1", DeviceState::On),
            ("led_1", DeviceState::Off),
        ]);
        let targets = states(&[
            ("led_1", DeviceState::On),
            ("ventilation_1", DeviceState::Off),
        ]);

        let result = resolve(&registry(), &current, &targets);
        assert!(matches!(result, Err(VerdantError::Conflict(_))));
    }

    #[test]
    fn should_name_both_devices_in_conflict() {
        let current = states(&[
            ("ventilation_1", DeviceState::On),
            ("led_1", DeviceState::On),
        ]);
        let targets = states(&[
            ("led_1", DeviceState::On),
            ("ventilation_1", DeviceState::Off),
        ]);

        let Err(VerdantError::Conflict(conflict)) = resolve(&registry(), &current, &targets)
        else {
            panic!("expected a dependency conflict");
        };
        let named = [conflict.device.clone(), conflict.conflicts_with.clone()];
        assert!(named.contains(&DeviceId::new("led_1")));
        assert!(named.contains(&DeviceId::new("ventilation_1")));
    }

    #[test]
    fn should_reject_target_for_unknown_device() {
        let current = states(&[]);
        let targets = states(&[("heater_9", DeviceState::On)]);
        let result = resolve(&registry(), &current, &targets);
        assert!(matches!(result, Err(VerdantError::NotFound(_))));
    }

    #[test]
    fn should_cascade_through_dependency_chains() {
        // power -> fan -> led: turning the led on raises both.
        let registry = DeviceRegistry::new(vec![
            Device::new("power", "12V Supply"),
            Device::new("fan", "Fan").requires("power"),
            Device::new("led", "LED").requires("fan"),
        ])
        .unwrap();
        let current = states(&[
            ("power", DeviceState::Off),
            ("fan", DeviceState::Off),
            ("led", DeviceState::Off),
        ]);
        let targets = states(&[("led", DeviceState::On)]);

        let plan = resolve(&registry, &current, &targets).unwrap();
        let devices: Vec<_> = plan.iter().map(|step| step.device.as_str()).collect();
        assert_eq!(devices, vec!["power", "fan", "led"]);
    }

    #[test]
    fn should_cascade_off_through_dependents() {
        let registry = DeviceRegistry::new(vec![
            Device::new("power", "12V Supply"),
            Device::new("fan", "Fan").requires("power"),
            Device::new("led", "LED").requires("fan"),
        ])
        .unwrap();
        let current = states(&[
            ("power", DeviceState::On),
            ("fan", DeviceState::On),
            ("led", DeviceState::On),
        ]);
        let targets = states(&[("power", DeviceState::Off)]);

        let plan = resolve(&registry, &current, &targets).unwrap();
        let devices: Vec<_> = plan.iter().map(|step| step.device.as_str()).collect();
        assert_eq!(devices, vec!["led", "fan", "power"]);
    }

    #[test]
    fn should_never_turn_device_on_while_prerequisite_ends_off() {
        // Property from the dependency invariant: any plan that turns a
        // device ON leaves every member of its requires set ON.
        let registry = registry();
        let current = states(&[
            ("ventilation_1", DeviceState::Off),
            ("led_1", DeviceState::Off),
        ]);
        let targets = states(&[("led_1", DeviceState::On)]);

        let plan = resolve(&registry, &current, &targets).unwrap();
        let mut end_states = current;
        for step in &plan {
            end_states.insert(step.device.clone(), step.state);
        }
        for step in &plan {
            if step.state == DeviceState::On {
                for prerequisite in registry.requires(&step.device) {
                    assert_eq!(end_states.get(prerequisite), Some(&DeviceState::On));
                }
            }
        }
    }

    #[test]
    fn should_report_dependent_on_step_as_downstream_of_failed_prerequisite() {
        let registry = registry();
        let failed = PlanStep {
            device: DeviceId::new("ventilation_1"),
            state: DeviceState::On,
        };
        let remaining = vec![PlanStep {
            device: DeviceId::new("led_1"),
            state: DeviceState::On,
        }];

        let blocked = downstream_of(&registry, &remaining, &failed);
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].device, DeviceId::new("led_1"));
    }

    #[test]
    fn should_not_block_independent_steps_after_failure() {
        let registry = DeviceRegistry::new(vec![
            Device::new("fan", "Fan"),
            Device::new("heater", "Heater"),
        ])
        .unwrap();
        let failed = PlanStep {
            device: DeviceId::new("fan"),
            state: DeviceState::On,
        };
        let remaining = vec![PlanStep {
            device: DeviceId::new("heater"),
            state: DeviceState::On,
        }];

        let blocked = downstream_of(&registry, &remaining, &failed);
        assert!(blocked.is_empty());
    }
}
