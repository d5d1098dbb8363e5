//! Last operation bookkeeping of a managed cluster

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::codes::ErrorCode;

/// Kind of operation last performed on a cluster or extension
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum LastOperationType {
    /// Initial creation
    Create,
    /// Regular reconciliation
    Reconcile,
    /// Deletion
    Delete,
    /// Control plane migration
    Migrate,
    /// Control plane restoration after a migration
    Restore,
}

impl LastOperationType {
    /// Create and delete leave the cluster partially built while in flight
    pub fn is_unstable(&self) -> bool {
        matches!(self, Self::Create | Self::Delete)
    }
}

/// State of the last operation
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum LastOperationState {
    /// Operation is running
    Processing,
    /// Operation finished successfully
    Succeeded,
    /// Operation failed but will be retried
    Error,
    /// Operation failed permanently
    Failed,
    /// Operation is queued
    Pending,
    /// Operation was aborted
    Aborted,
}

impl std::fmt::Display for LastOperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "Processing"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Error => write!(f, "Error"),
            Self::Failed => write!(f, "Failed"),
            Self::Pending => write!(f, "Pending"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Last operation performed on an object
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    /// Operation kind
    #[serde(rename = "type")]
    pub type_: LastOperationType,
    /// Operation state
    pub state: LastOperationState,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Progress in percent
    #[serde(default)]
    pub progress: i32,
    /// Last time the operation reported anything
    pub last_update_time: DateTime<Utc>,
}

impl LastOperation {
    /// Returns true if the operation finished successfully
    pub fn succeeded(&self) -> bool {
        self.state == LastOperationState::Succeeded
    }
}

/// Error recorded during the last operation
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    /// Error text
    pub description: String,
    /// Identifier of the task that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Classified codes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<ErrorCode>,
    /// When the error was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}
