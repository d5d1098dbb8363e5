//! ManagedResource: a bundle of manifests applied and health-tracked as a unit

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::Condition;

/// Sub-condition: all manifests were applied
pub const RESOURCES_APPLIED: &str = "ResourcesApplied";
/// Sub-condition: all applied objects are healthy
pub const RESOURCES_HEALTHY: &str = "ResourcesHealthy";
/// Sub-condition: some applied objects are still rolling out
pub const RESOURCES_PROGRESSING: &str = "ResourcesProgressing";
/// Reason set on `ResourcesApplied` when applying failed
pub const REASON_APPLY_FAILED: &str = "ApplyFailed";

/// Bundle of manifests reconciled by the resource manager
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "resources.gardener.cloud",
    version = "v1alpha1",
    kind = "ManagedResource",
    plural = "managedresources",
    shortname = "mr",
    namespaced,
    status = "ManagedResourceStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceSpec {
    /// Resource class; unset means the resources target the managed cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

/// Observed state of a managed resource
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceStatus {
    /// Generation last processed by the resource manager
    #[serde(default)]
    pub observed_generation: i64,
    /// Applied / Healthy / Progressing sub-conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ManagedResource {
    /// Find a sub-condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.iter().find(|c| c.type_ == type_))
    }

    /// Whether the resources of this bundle are deployed into the managed cluster
    pub fn targets_managed_cluster(&self) -> bool {
        self.spec.class.is_none()
    }
}
