//! Worker extension resource

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::operation::{LastOperation, LastOperationState};

/// Provider extension resource that materializes worker pools as machines
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Worker",
    plural = "workers",
    namespaced,
    status = "WorkerStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSpec {
    /// Provider type handled by the extension
    #[serde(rename = "type", default)]
    pub type_: String,
}

/// Observed state of a worker extension resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    /// Last operation of the extension controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,
}

impl Worker {
    /// A worker still processing a reconciliation is mid rolling update
    pub fn is_rolling_update(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.last_operation.as_ref())
            .is_some_and(|op| op.state == LastOperationState::Processing)
    }
}
