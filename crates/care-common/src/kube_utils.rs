//! Helpers for reading status fields of built-in Kubernetes resources

use k8s_openapi::api::apps::v1::{DeploymentCondition, StatefulSetCondition};
use k8s_openapi::api::core::v1::{Node, NodeCondition};

use crate::WORKER_POOL_LABEL;

// Kubernetes condition type constants
/// The "Ready" condition type for nodes
pub const CONDITION_READY: &str = "Ready";
/// The "Available" condition type for deployments
pub const CONDITION_AVAILABLE: &str = "Available";
/// The "Progressing" condition type for deployments
pub const CONDITION_PROGRESSING: &str = "Progressing";
/// The "ReplicaFailure" condition type for deployments
pub const CONDITION_REPLICA_FAILURE: &str = "ReplicaFailure";
/// The "True" status value for conditions
pub const STATUS_TRUE: &str = "True";
/// The "False" status value for conditions
pub const STATUS_FALSE: &str = "False";

/// Annotation marking nodes that the machine controller does not manage
pub const ANNOTATION_NOT_MANAGED_BY_MCM: &str = "node.machine.sapcloud.io/not-managed-by-mcm";
/// Annotation carrying the checksum of the last applied cloud config
pub const ANNOTATION_CLOUD_CONFIG_CHECKSUM: &str = "checksum/cloud-config-data";

/// Trait for types that have condition-like fields
pub trait HasConditionFields {
    /// Get the condition type field value
    fn type_field(&self) -> &str;
    /// Get the condition status field value
    fn status_field(&self) -> &str;
    /// Get the condition reason, empty if unset
    fn reason_field(&self) -> &str;
    /// Get the condition message, empty if unset
    fn message_field(&self) -> &str;
}

macro_rules! impl_has_condition_fields {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl HasConditionFields for $ty {
                fn type_field(&self) -> &str {
                    &self.type_
                }
                fn status_field(&self) -> &str {
                    &self.status
                }
                fn reason_field(&self) -> &str {
                    self.reason.as_deref().unwrap_or_default()
                }
                fn message_field(&self) -> &str {
                    self.message.as_deref().unwrap_or_default()
                }
            }
        )+
    };
}

impl_has_condition_fields!(NodeCondition, DeploymentCondition, StatefulSetCondition);

/// Find the condition of the given type
pub fn get_condition<'a, T>(conditions: Option<&'a [T]>, condition_type: &str) -> Option<&'a T>
where
    T: HasConditionFields,
{
    conditions.and_then(|conds| conds.iter().find(|c| c.type_field() == condition_type))
}

/// Check if a Kubernetes condition of the given type has status "True"
pub fn has_condition<T>(conditions: Option<&[T]>, condition_type: &str) -> bool
where
    T: HasConditionFields,
{
    get_condition(conditions, condition_type).is_some_and(|c| c.status_field() == STATUS_TRUE)
}

/// Conditions of a node, if it reported any
pub fn node_conditions(node: &Node) -> Option<&[NodeCondition]> {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
}

/// Check if a node reports `Ready=True`
pub fn is_node_ready(node: &Node) -> bool {
    has_condition(node_conditions(node), CONDITION_READY)
}

/// Check if a node is cordoned
pub fn is_node_unschedulable(node: &Node) -> bool {
    node.spec
        .as_ref()
        .and_then(|s| s.unschedulable)
        .unwrap_or(false)
}

/// Worker pool a node belongs to
pub fn node_pool(node: &Node) -> Option<&str> {
    node.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(WORKER_POOL_LABEL))
        .map(String::as_str)
}

/// Value of a node annotation
pub fn node_annotation<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

/// Kubelet version reported by a node
pub fn kubelet_version(node: &Node) -> Option<&str> {
    node.status
        .as_ref()
        .and_then(|s| s.node_info.as_ref())
        .map(|info| info.kubelet_version.as_str())
}

/// Name of a resource, empty if unset
pub fn name_of(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or_default()
}
