//! Automation rule engine — pure evaluation over a sensor snapshot.
//!
//! The engine holds no state: given the active rule set, one snapshot,
//! and the tick's local time-of-day, it produces at most one winning
//! vote per device. Re-evaluating the same inputs yields identical
//! votes.

use std::collections::BTreeMap;

use chrono::NaiveTime;

use verdant_domain::device::DeviceState;
use verdant_domain::id::DeviceId;
use verdant_domain::rule::Rule;
use verdant_domain::sensor::SensorSnapshot;

/// The winning automation vote for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub state: DeviceState,
    /// Name of the rule that cast the winning vote.
    pub rule: String,
    pub priority: i32,
}

/// Evaluate every active rule and resolve conflicts per device.
///
/// Among all rules targeting a device that cast a vote, the highest
/// priority wins; ties go to the lexicographically smallest rule name
/// so evaluation stays reproducible. Devices with zero votes get no
/// entry and keep their last state.
#[must_use]
pub fn evaluate(
    rules: &[Rule],
    snapshot: &SensorSnapshot,
    local_time: NaiveTime,
) -> BTreeMap<DeviceId, Vote> {
    let mut votes: BTreeMap<DeviceId, Vote> = BTreeMap::new();

    for rule in rules.iter().filter(|rule| rule.active) {
        let Some(state) = rule.evaluate(snapshot, local_time) else {
            tracing::debug!(rule = %rule.name, "rule abstained, required sensor kind absent");
            continue;
        };
        let candidate = Vote {
            state,
            rule: rule.name.clone(),
            priority: rule.priority,
        };
        votes
            .entry(rule.device.clone())
            .and_modify(|current| {
                if candidate.priority > current.priority
                    || (candidate.priority == current.priority && candidate.rule < current.rule)
                {
                    *current = candidate.clone();
                }
            })
            .or_insert(candidate);
    }

    votes
}
