//! Typed status observations.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Truth value of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A timestamped boolean observation attached to scan-request status.
///
/// Conditions are keyed by `type`; [`set_condition`] keeps at most one entry
/// per type and tracks the last transition time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    /// Build a condition stamped with the current time.
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Some(Utc::now()),
        }
    }
}

/// Insert or update `candidate` in `conditions`, keyed by condition type.
///
/// The transition time is preserved when the boolean status is unchanged, so
/// repeated reconciliations do not churn timestamps.
pub fn set_condition(conditions: &mut Vec<Condition>, candidate: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == candidate.type_) {
        Some(existing) => {
            if existing.status == candidate.status {
                existing.reason = candidate.reason;
                existing.message = candidate.message;
            } else {
                *existing = candidate;
            }
        }
        None => conditions.push(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(status: ConditionStatus, reason: &str) -> Condition {
        Condition::new("Ready", status, reason, "msg")
    }

    #[test]
    fn inserts_new_condition_type() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, ready(ConditionStatus::False, "Running"));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].reason, "Running");
    }

    #[test]
    fn replaces_same_type_on_status_change() {
        let mut conditions = vec![ready(ConditionStatus::False, "Running")];
        let first_transition = conditions[0].last_transition_time;

        let mut next = ready(ConditionStatus::True, "Completed");
        next.last_transition_time = first_transition.map(|t| t + chrono::Duration::seconds(5));
        set_condition(&mut conditions, next);

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_ne!(conditions[0].last_transition_time, first_transition);
    }

    #[test]
    fn keeps_transition_time_when_status_unchanged() {
        let mut conditions = vec![ready(ConditionStatus::False, "Running")];
        let first_transition = conditions[0].last_transition_time;

        let mut repeat = ready(ConditionStatus::False, "StillRunning");
        repeat.last_transition_time = first_transition.map(|t| t + chrono::Duration::seconds(5));
        set_condition(&mut conditions, repeat);

        assert_eq!(conditions[0].last_transition_time, first_transition);
        assert_eq!(conditions[0].reason, "StillRunning");
    }

    #[test]
    fn distinct_types_coexist() {
        let mut conditions = vec![ready(ConditionStatus::True, "Completed")];
        set_condition(
            &mut conditions,
            Condition::new("Stored", ConditionStatus::True, "ResultsStored", "msg"),
        );
        assert_eq!(conditions.len(), 2);
    }

    #[test]
    fn serializes_type_field_name() {
        let json = serde_json::to_value(ready(ConditionStatus::True, "Completed")).unwrap();
        assert_eq!(json["type"], "Ready");
        assert_eq!(json["status"], "True");
        assert!(json["lastTransitionTime"].is_string());
    }
}
