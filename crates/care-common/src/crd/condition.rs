//! Health conditions and their transition helpers

use std::fmt::Display;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::codes::ErrorCode;

/// Condition type reporting whether the API server answers `/healthz`
pub const API_SERVER_AVAILABLE: &str = "APIServerAvailable";
/// Condition type for control-plane deployments and etcds
pub const CONTROL_PLANE_HEALTHY: &str = "ControlPlaneHealthy";
/// Condition type for monitoring and logging components
pub const OBSERVABILITY_COMPONENTS_HEALTHY: &str = "ObservabilityComponentsHealthy";
/// Condition type for workloads deployed into the managed cluster
pub const SYSTEM_COMPONENTS_HEALTHY: &str = "SystemComponentsHealthy";
/// Condition type for worker nodes
pub const EVERY_NODE_READY: &str = "EveryNodeReady";
/// Constraint type reporting whether the cluster can be hibernated and woken up
pub const HIBERNATION_POSSIBLE: &str = "HibernationPossible";

/// Reason used for freshly created conditions
pub const REASON_CONDITION_INITIALIZED: &str = "ConditionInitialized";
/// Reason used when evaluating a condition failed with an error
pub const REASON_CONDITION_CHECK_ERROR: &str = "ConditionCheckError";

/// Condition status following Kubernetes conventions plus `Progressing`
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition is failing but still inside its grace window
    Progressing,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Progressing => write!(f, "Progressing"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
///
/// Conditions are values: every evaluation derives a new one from the
/// previous one instead of editing it in place.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., ControlPlaneHealthy)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Last time the status changed
    #[serde(default)]
    pub last_transition_time: DateTime<Utc>,

    /// Last time reason, message or codes changed
    #[serde(default)]
    pub last_update_time: DateTime<Utc>,

    /// Classified error codes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<ErrorCode>,
}

impl Condition {
    /// Create a new condition stamped with the clock's current time
    pub fn new(
        clock: &dyn Clock,
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = clock.now();
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: now,
            last_update_time: now,
            codes: Vec::new(),
        }
    }

    /// Create an `Unknown` condition whose check has not run yet
    pub fn initialized(clock: &dyn Clock, type_: impl Into<String>) -> Self {
        Self::new(
            clock,
            type_,
            ConditionStatus::Unknown,
            REASON_CONDITION_INITIALIZED,
            "The condition has been initialized but its semantic check has not been performed yet.",
        )
    }

    /// Derive a new condition from this one
    ///
    /// The transition time moves only when the status changes. The update
    /// time moves only when reason, message or codes change.
    pub fn updated(
        &self,
        clock: &dyn Clock,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        codes: Vec<ErrorCode>,
    ) -> Self {
        let now = clock.now();
        let reason = reason.into();
        let message = message.into();

        let last_transition_time = if self.status != status {
            now
        } else {
            self.last_transition_time
        };
        let last_update_time =
            if self.reason != reason || self.message != message || self.codes != codes {
                now
            } else {
                self.last_update_time
            };

        Self {
            type_: self.type_.clone(),
            status,
            reason,
            message,
            last_transition_time,
            last_update_time,
            codes,
        }
    }

    /// Derive an `Unknown` condition carrying an evaluation error
    pub fn updated_unknown_error(&self, clock: &dyn Clock, err: &dyn Display) -> Self {
        self.updated(
            clock,
            ConditionStatus::Unknown,
            REASON_CONDITION_CHECK_ERROR,
            err.to_string(),
            Vec::new(),
        )
    }

    /// Returns true if the condition has the given status
    pub fn has_status(&self, status: ConditionStatus) -> bool {
        self.status == status
    }
}

/// Return the evaluated condition, or an `Unknown` one if evaluation failed
pub fn condition_or_unknown<E: Display>(
    clock: &dyn Clock,
    old: &Condition,
    result: Result<Condition, E>,
) -> Condition {
    match result {
        Ok(condition) => condition,
        Err(err) => old.updated_unknown_error(clock, &err),
    }
}

/// Find the condition of the given type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Find the condition of the given type, or initialize a new one
pub fn get_or_init_condition(
    clock: &dyn Clock,
    conditions: &[Condition],
    type_: &str,
) -> Condition {
    find_condition(conditions, type_)
        .cloned()
        .unwrap_or_else(|| Condition::initialized(clock, type_))
}

/// A condition reported by a decoupled extension controller
#[derive(Clone, Debug, PartialEq)]
pub struct ExtensionCondition {
    /// The reported condition
    pub condition: Condition,
    /// Kind of the extension resource (e.g., "Worker", "ControlPlane")
    pub extension_type: String,
    /// Name of the extension resource
    pub extension_name: String,
    /// Namespace of the extension resource
    pub extension_namespace: String,
    /// Last time the extension controller confirmed it is alive
    pub last_heartbeat_time: Option<DateTime<Utc>>,
}
