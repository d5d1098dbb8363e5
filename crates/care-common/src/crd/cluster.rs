//! Definition of a managed cluster as seen by the care engine
//!
//! This is the read-only view the health checks need: Kubernetes version,
//! worker pools, purpose and hibernation flags, and the last operation.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::operation::{LastError, LastOperation};
use crate::version::KubernetesVersion;
use crate::Error;

/// What the cluster is used for
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClusterPurpose {
    /// Short-lived evaluation cluster
    #[default]
    Evaluation,
    /// Throwaway test cluster without observability stack
    Testing,
    /// Development cluster
    Development,
    /// Production cluster
    Production,
    /// Infrastructure cluster
    Infrastructure,
}

/// A named group of nodes sharing machine type, version and scaling bounds
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPool {
    /// Pool name, matched against the node pool label
    pub name: String,
    /// Minimum number of machines
    pub minimum: i32,
    /// Maximum number of machines
    pub maximum: i32,
    /// Pool-specific Kubernetes version overriding the cluster version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
}

/// The managed cluster under evaluation
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCluster {
    /// Cluster name
    pub name: String,
    /// Namespace hosting the cluster's control plane
    pub control_plane_namespace: String,
    /// Cluster-wide Kubernetes version
    pub kubernetes_version: String,
    /// What the cluster is used for
    #[serde(default)]
    pub purpose: ClusterPurpose,
    /// Worker pools; empty for workerless clusters
    #[serde(default)]
    pub workers: Vec<WorkerPool>,
    /// Whether the vertical pod autoscaler is enabled
    #[serde(default)]
    pub vertical_pod_autoscaler_enabled: bool,
    /// Whether hibernation has been requested
    #[serde(default)]
    pub hibernation_enabled: bool,
    /// Whether the cluster is currently hibernated
    #[serde(default)]
    pub is_hibernated: bool,
    /// Desired cloud-config checksum per worker pool
    #[serde(default)]
    pub cloud_config_checksums: BTreeMap<String, String>,
    /// Last operation performed on the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,
    /// Errors of the last operation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub last_errors: Vec<LastError>,
}

impl ManagedCluster {
    /// Workerless clusters only run a control plane
    pub fn is_workerless(&self) -> bool {
        self.workers.is_empty()
    }

    /// Testing clusters run without logging
    pub fn is_testing(&self) -> bool {
        self.purpose == ClusterPurpose::Testing
    }

    /// Hibernation requested or already in effect
    pub fn is_hibernation_active(&self) -> bool {
        self.hibernation_enabled || self.is_hibernated
    }

    /// Returns true if any pool can scale, i.e. has `maximum > minimum`
    ///
    /// Pools with inverted bounds are a configuration error.
    pub fn wants_cluster_autoscaler(&self) -> Result<bool, Error> {
        let mut wanted = false;
        for (i, pool) in self.workers.iter().enumerate() {
            if pool.maximum < pool.minimum {
                return Err(Error::validation_for_field(
                    &self.name,
                    format!("spec.provider.workers[{i}].maximum"),
                    format!(
                        "worker pool {:?} has maximum {} lower than minimum {}",
                        pool.name, pool.maximum, pool.minimum
                    ),
                ));
            }
            wanted |= pool.maximum > pool.minimum;
        }
        Ok(wanted)
    }

    /// The Kubernetes version a pool actually runs
    ///
    /// A pool-level version overrides the cluster-wide one.
    pub fn effective_kubernetes_version(
        &self,
        pool: &WorkerPool,
    ) -> Result<KubernetesVersion, Error> {
        pool.kubernetes_version
            .as_deref()
            .unwrap_or(&self.kubernetes_version)
            .parse()
    }
}
