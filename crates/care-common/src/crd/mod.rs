//! Resource and value types consumed by the care engine
//!
//! Built-in Kubernetes kinds come from `k8s-openapi`. The custom resources of
//! the etcd operator, machine controller manager, resource manager and
//! extension controllers are modelled here with only the fields the health
//! checks read.

mod cluster;
mod condition;
mod etcd;
mod machine;
mod managed_resource;
mod operation;
mod worker;

pub use cluster::{ClusterPurpose, ManagedCluster, WorkerPool};
pub use condition::{
    condition_or_unknown, find_condition, get_or_init_condition, Condition, ConditionStatus,
    ExtensionCondition, API_SERVER_AVAILABLE, CONTROL_PLANE_HEALTHY, EVERY_NODE_READY,
    HIBERNATION_POSSIBLE, OBSERVABILITY_COMPONENTS_HEALTHY, REASON_CONDITION_CHECK_ERROR,
    REASON_CONDITION_INITIALIZED, SYSTEM_COMPONENTS_HEALTHY,
};
pub use etcd::{Etcd, EtcdSpec, EtcdStatus};
pub use machine::{
    Machine, MachineCurrentStatus, MachineDeployment, MachineDeploymentSpec, MachinePhase,
    MachineSpec, MachineStatus, MACHINE_NODE_LABEL,
};
pub use managed_resource::{
    ManagedResource, ManagedResourceSpec, ManagedResourceStatus, REASON_APPLY_FAILED,
    RESOURCES_APPLIED, RESOURCES_HEALTHY, RESOURCES_PROGRESSING,
};
pub use operation::{LastError, LastOperation, LastOperationState, LastOperationType};
pub use worker::{Worker, WorkerSpec, WorkerStatus};
