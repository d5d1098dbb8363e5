//! Machine and MachineDeployment resources of the machine controller manager

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label on a Machine naming the Node it backs
pub const MACHINE_NODE_LABEL: &str = "node";

/// A single machine backing one node
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "machine.sapcloud.io",
    version = "v1alpha1",
    kind = "Machine",
    plural = "machines",
    namespaced,
    status = "MachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Provider-specific machine identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Observed state of a machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Current lifecycle status
    #[serde(default)]
    pub current_status: MachineCurrentStatus,
}

/// Current lifecycle status of a machine
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineCurrentStatus {
    /// Raw phase string; empty while the machine controller has not set one
    #[serde(default)]
    pub phase: String,
}

/// Lifecycle phase of a machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MachinePhase {
    /// No phase reported yet
    Empty,
    /// Machine is being created
    Pending,
    /// Machine exists and its node joined
    Available,
    /// Machine is running
    Running,
    /// Machine is being deleted
    Terminating,
    /// Machine health is unknown
    Unknown,
    /// Machine creation or health check failed
    Failed,
    /// Machine keeps failing to come up
    CrashLoopBackOff,
    /// Any phase this engine does not know
    Other(String),
}

impl From<&str> for MachinePhase {
    fn from(phase: &str) -> Self {
        match phase {
            "" => Self::Empty,
            "Pending" => Self::Pending,
            "Available" => Self::Available,
            "Running" => Self::Running,
            "Terminating" => Self::Terminating,
            "Unknown" => Self::Unknown,
            "Failed" => Self::Failed,
            "CrashLoopBackOff" => Self::CrashLoopBackOff,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Machine {
    /// Current lifecycle phase
    pub fn phase(&self) -> MachinePhase {
        self.status
            .as_ref()
            .map(|s| MachinePhase::from(s.current_status.phase.as_str()))
            .unwrap_or(MachinePhase::Empty)
    }

    /// Name of the node backed by this machine, if it registered one
    pub fn node_name(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(MACHINE_NODE_LABEL))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }
}

/// A scalable set of machines for one worker pool and zone
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "machine.sapcloud.io",
    version = "v1alpha1",
    kind = "MachineDeployment",
    plural = "machinedeployments",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentSpec {
    /// Desired machine count
    #[serde(default)]
    pub replicas: i32,
}
