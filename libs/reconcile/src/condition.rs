//! Status conditions and the condition upsert path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tri-state value of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl ConditionStatus {
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

/// A named, timestamped fact attached to an object's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type; the key for upserts.
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    /// Machine-readable reason code.
    pub reason: String,

    /// Human-readable detail.
    pub message: String,

    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Creates a condition stamped with `now`.
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: now,
        }
    }
}

/// Sets or replaces a condition by type.
///
/// A `None` list is left untouched. Otherwise the first entry with the same
/// type is replaced wholesale (including `last_transition_time`, even when
/// nothing else changed), or the condition is appended. Untouched entries keep
/// their order.
pub fn set_condition(conditions: Option<&mut Vec<Condition>>, condition: Condition) {
    let Some(conditions) = conditions else {
        return;
    };

    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

/// Finds the most recent condition of the given type.
///
/// When several entries share a type (lists not written through
/// [`set_condition`]), the one with the latest transition time wins; ties go
/// to the later entry.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions
        .iter()
        .filter(|c| c.type_ == type_)
        .max_by_key(|c| c.last_transition_time)
}
