//! Rule — a named condition that casts an automation vote for one device.
//!
//! Rules are immutable once loaded for a tick; reload happens between
//! ticks, never mid-evaluation. A rule that evaluates true votes ON for
//! its target device, false votes OFF, and a rule that cannot be
//! evaluated (required sensor kind absent from the snapshot) abstains —
//! missing data must never force a device off.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::device::{DeviceRegistry, DeviceState};
use crate::error::{ConfigurationError, ValidationError, VerdantError};
use crate::id::DeviceId;
use crate::sensor::{SensorKind, SensorSnapshot};

/// Comparison operator for threshold conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
}

impl Operator {
    /// Apply the comparison to a measured value.
    #[must_use]
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterOrEqual => value >= threshold,
            Self::LessOrEqual => value <= threshold,
            Self::Equal => (value - threshold).abs() < f64::EPSILON,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterThan => f.write_str(">"),
            Self::LessThan => f.write_str("<"),
            Self::GreaterOrEqual => f.write_str(">="),
            Self::LessOrEqual => f.write_str("<="),
            Self::Equal => f.write_str("=="),
        }
    }
}

/// One atomic sensor comparison.
///
/// A condition is met when *any* reading of its kind satisfies the
/// comparison (multiple probes of the same kind are all consulted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: SensorKind,
    pub operator: Operator,
    pub threshold: f64,
}

impl Condition {
    /// Evaluate against a snapshot. `None` when the kind is absent.
    #[must_use]
    pub fn is_met(&self, snapshot: &SensorSnapshot) -> Option<bool> {
        if !snapshot.has_kind(self.kind) {
            return None;
        }
        Some(
            snapshot
                .values_of(self.kind)
                .any(|value| self.operator.compare(value, self.threshold)),
        )
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.kind, self.operator, self.threshold)
    }
}

/// A local time-of-day window, wrapping past midnight when `end < start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    /// Start of the window, local time.
    pub start: NaiveTime,
    /// End of the window, local time.
    pub end: NaiveTime,
}

impl ScheduleWindow {
    /// Whether the instant falls inside the window.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            // Overnight window, e.g. 22:00..06:00.
            time >= self.start || time <= self.end
        }
    }
}

impl std::fmt::Display for ScheduleWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// The condition kind a rule evaluates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// All sensor conditions must hold (logical AND).
    Threshold { conditions: Vec<Condition> },
    /// The evaluation instant must fall inside the window.
    Schedule { window: ScheduleWindow },
    /// Boolean AND of the threshold conditions and the window.
    Combined {
        conditions: Vec<Condition>,
        window: ScheduleWindow,
    },
}

/// A named automation rule targeting one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique name, also the lexicographic tie-breaker between rules of
    /// equal priority.
    pub name: String,
    /// The device this rule votes for.
    pub device: DeviceId,
    pub condition: RuleCondition,
    /// Inactive rules are skipped entirely.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Higher priority wins conflicting votes for the same device.
    #[serde(default)]
    pub priority: i32,
}

fn default_active() -> bool {
    true
}

impl Rule {
    /// Create a builder for constructing a [`Rule`].
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::Validation`] when the name is empty or a
    /// threshold/combined condition has no sensor conditions.
    pub fn validate(&self) -> Result<(), VerdantError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyRuleName.into());
        }
        let conditions = match &self.condition {
            RuleCondition::Threshold { conditions } | RuleCondition::Combined { conditions, .. } => {
                conditions
            }
            RuleCondition::Schedule { .. } => return Ok(()),
        };
        if conditions.is_empty() {
            return Err(ValidationError::NoConditions {
                name: self.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Evaluate the rule against a snapshot at a local time-of-day.
    ///
    /// Returns `Some(On)` when the condition holds, `Some(Off)` when it
    /// does not, and `None` (abstain) when a required sensor kind is
    /// absent from the snapshot.
    #[must_use]
    pub fn evaluate(&self, snapshot: &SensorSnapshot, local_time: NaiveTime) -> Option<DeviceState> {
        let verdict = match &self.condition {
            RuleCondition::Threshold { conditions } => all_met(conditions, snapshot)?,
            RuleCondition::Schedule { window } => window.contains(local_time),
            RuleCondition::Combined { conditions, window } => {
                all_met(conditions, snapshot)? && window.contains(local_time)
            }
        };
        Some(if verdict {
            DeviceState::On
        } else {
            DeviceState::Off
        })
    }

    /// The sensor kinds this rule needs to cast a vote.
    #[must_use]
    pub fn required_kinds(&self) -> Vec<SensorKind> {
        match &self.condition {
            RuleCondition::Threshold { conditions } | RuleCondition::Combined { conditions, .. } => {
                conditions.iter().map(|condition| condition.kind).collect()
            }
            RuleCondition::Schedule { .. } => Vec::new(),
        }
    }
}

/// AND of all conditions; abstains if any required kind is absent.
fn all_met(conditions: &[Condition], snapshot: &SensorSnapshot) -> Option<bool> {
    let mut verdict = true;
    for condition in conditions {
        verdict &= condition.is_met(snapshot)?;
    }
    Some(verdict)
}

/// Step-by-step builder for [`Rule`].
#[derive(Debug, Default)]
pub struct RuleBuilder {
    name: Option<String>,
    device: Option<DeviceId>,
    conditions: Vec<Condition>,
    window: Option<ScheduleWindow>,
    active: Option<bool>,
    priority: Option<i32>,
}

impl RuleBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn device(mut self, device: impl Into<DeviceId>) -> Self {
        self.device = Some(device.into());
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn window(mut self, window: ScheduleWindow) -> Self {
        self.window = Some(window);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Consume the builder, validate, and return a [`Rule`].
    ///
    /// The condition kind is inferred from what was provided: conditions
    /// only → threshold, window only → schedule, both → combined.
    ///
    /// # Errors
    ///
    /// Returns [`VerdantError::Validation`] if required fields are
    /// missing or empty.
    pub fn build(self) -> Result<Rule, VerdantError> {
        let condition = match (self.conditions.is_empty(), self.window) {
            (false, Some(window)) => RuleCondition::Combined {
                conditions: self.conditions,
                window,
            },
            (_, Some(window)) => RuleCondition::Schedule { window },
            (_, None) => RuleCondition::Threshold {
                conditions: self.conditions,
            },
        };
        let rule = Rule {
            name: self.name.unwrap_or_default(),
            device: self.device.unwrap_or_else(|| DeviceId::new("")),
            condition,
            active: self.active.unwrap_or(true),
            priority: self.priority.unwrap_or(0),
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// Validate a full rule set against the device registry.
///
/// # Errors
///
/// Returns [`VerdantError::Configuration`] for duplicate rule names or
/// rules targeting unknown devices, and [`VerdantError::Validation`]
/// for per-rule invariant failures.
pub fn validate_rules(rules: &[Rule], registry: &DeviceRegistry) -> Result<(), VerdantError> {
    let mut seen = std::collections::BTreeSet::new();
    for rule in rules {
        rule.validate()?;
        if !seen.insert(rule.name.as_str()) {
            return Err(ConfigurationError::DuplicateRuleName {
                name: rule.name.clone(),
            }
            .into());
        }
        if !registry.contains(&rule.device) {
            return Err(ConfigurationError::UnknownDevice {
                device: rule.device.clone(),
                referenced_by: format!("rule '{}'", rule.name),
            }
            .into());
        }
    }
    Ok(())
}
