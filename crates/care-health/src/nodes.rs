//! Worker node checks for the `EveryNodeReady` condition

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use tracing::{debug, instrument};

use care_common::crd::{Condition, ConditionStatus, ManagedCluster};
use care_common::kube_utils::{
    is_node_ready, kubelet_version, name_of, node_annotation, node_pool,
    ANNOTATION_CLOUD_CONFIG_CHECKSUM,
};
use care_common::version::KubernetesVersion;
use care_common::Error;

use crate::checker::{CheckPipeline, HealthChecker};
use crate::predicates::{check_kubelet_version, check_node};
use crate::scaling::{
    check_nodes_scaling_down, check_nodes_scaling_up, desired_machine_count, ScalingIssue,
};

/// Reason when a node fails its health predicate
pub const REASON_NODE_UNHEALTHY: &str = "NodeUnhealthy";
/// Reason when a kubelet runs a different patch version than its pool
pub const REASON_KUBELET_VERSION_MISMATCH: &str = "KubeletVersionMismatch";
/// Reason when a pool has fewer nodes than its minimum
pub const REASON_MISSING_NODES: &str = "MissingNodes";
/// Reason when a node did not apply the current cloud config
pub const REASON_CLOUD_CONFIG_OUTDATED: &str = "CloudConfigOutdated";
/// Reason while fewer nodes than desired are ready
pub const REASON_NODES_SCALING_UP: &str = "NodesScalingUp";
/// Reason while more nodes than desired are registered
pub const REASON_NODES_SCALING_DOWN: &str = "NodesScalingDown";

/// Node with the parsed kubelet version and the version its pool requires
struct KubeletVersions<'a> {
    node: &'a str,
    kubelet: KubernetesVersion,
    expected: KubernetesVersion,
}

impl HealthChecker {
    /// Check the worker nodes of a cluster
    ///
    /// Nodes are checked for health, kubelet version, pool minimums and
    /// applied cloud config before the node count is reconciled with the
    /// desired machine count. Unparseable versions are errors once the
    /// kubelet step is reached.
    #[instrument(skip_all, fields(cluster = %cluster.name))]
    pub async fn check_cluster_nodes(
        &self,
        cluster: &ManagedCluster,
        condition: &Condition,
    ) -> Result<Option<Condition>, Error> {
        let namespace = &cluster.control_plane_namespace;
        let nodes = self.reader.list_nodes().await?;
        let machine_deployments = self.reader.list_machine_deployments(namespace).await?;
        let machines = self.reader.list_machines(namespace).await?;

        let pool_versions = cluster
            .workers
            .iter()
            .map(|pool| Ok((pool.name.as_str(), cluster.effective_kubernetes_version(pool)?)))
            .collect::<Result<BTreeMap<_, _>, Error>>()?;

        let desired = desired_machine_count(&machine_deployments);
        let ready = nodes.iter().filter(|n| is_node_ready(n)).count();
        let registered = nodes.len();
        debug!(desired, ready, registered, "node counts");

        CheckPipeline::new()
            .step("node health", || self.check_node_health(condition, &nodes))
            .try_step("kubelet versions", || {
                let kubelets = kubelet_versions(&nodes, &pool_versions)?;
                Ok(kubelets.iter().find_map(|k| {
                    check_kubelet_version(k.node, &k.kubelet, &k.expected)
                        .err()
                        .map(|unhealthy| {
                            self.failed_condition(
                                condition,
                                REASON_KUBELET_VERSION_MISMATCH,
                                &unhealthy.message,
                                unhealthy.codes,
                            )
                        })
                }))
            })
            .step("pool minimums", || {
                self.check_pool_minimums(cluster, condition, &nodes)
            })
            .step("cloud config", || {
                self.check_cloud_config(cluster, condition, &nodes)
            })
            .step("scaling", || {
                if machine_deployments.is_empty() {
                    return None;
                }
                if ready < desired {
                    check_nodes_scaling_up(&machines, ready, desired)
                        .err()
                        .map(|issue| self.scaling_condition(condition, REASON_NODES_SCALING_UP, issue))
                } else if registered > desired {
                    check_nodes_scaling_down(&machines, &nodes, registered, desired)
                        .err()
                        .map(|issue| {
                            self.scaling_condition(condition, REASON_NODES_SCALING_DOWN, issue)
                        })
                } else {
                    None
                }
            })
            .run()
    }

    fn check_node_health(&self, condition: &Condition, nodes: &[Node]) -> Option<Condition> {
        nodes.iter().find_map(|node| {
            check_node(node).err().map(|unhealthy| {
                self.failed_condition(
                    condition,
                    REASON_NODE_UNHEALTHY,
                    &format!(
                        "Node {:?} in worker group {:?} is unhealthy: {}",
                        name_of(&node.metadata),
                        node_pool(node).unwrap_or_default(),
                        unhealthy.message
                    ),
                    unhealthy.codes,
                )
            })
        })
    }

    fn check_pool_minimums(
        &self,
        cluster: &ManagedCluster,
        condition: &Condition,
        nodes: &[Node],
    ) -> Option<Condition> {
        cluster.workers.iter().find_map(|pool| {
            let registered = nodes
                .iter()
                .filter(|n| node_pool(n) == Some(pool.name.as_str()))
                .count();
            let minimum = usize::try_from(pool.minimum).unwrap_or(0);
            (registered < minimum).then(|| {
                self.failed_condition(
                    condition,
                    REASON_MISSING_NODES,
                    &format!(
                        "Not enough worker nodes registered in worker pool {:?} to meet minimum desired machine count. ({registered}/{minimum})",
                        pool.name
                    ),
                    Vec::new(),
                )
            })
        })
    }

    fn check_cloud_config(
        &self,
        cluster: &ManagedCluster,
        condition: &Condition,
        nodes: &[Node],
    ) -> Option<Condition> {
        nodes.iter().find_map(|node| {
            let current = node_annotation(node, ANNOTATION_CLOUD_CONFIG_CHECKSUM)?;
            let desired = cluster.cloud_config_checksums.get(node_pool(node)?)?;
            (current != desired).then(|| {
                self.failed_condition(
                    condition,
                    REASON_CLOUD_CONFIG_OUTDATED,
                    &format!(
                        "the last successfully applied cloud config on node {:?} is outdated (current: {current}, desired: {desired})",
                        name_of(&node.metadata)
                    ),
                    Vec::new(),
                )
            })
        })
    }

    /// Expected scaling states progress without the debouncer
    fn scaling_condition(
        &self,
        condition: &Condition,
        reason: &str,
        issue: ScalingIssue,
    ) -> Condition {
        match issue {
            ScalingIssue::Transient(message) => condition.updated(
                self.clock(),
                ConditionStatus::Progressing,
                reason,
                message,
                Vec::new(),
            ),
            ScalingIssue::Failure(message) => {
                self.failed_condition(condition, reason, &message, Vec::new())
            }
        }
    }
}

fn kubelet_versions<'a>(
    nodes: &'a [Node],
    pool_versions: &BTreeMap<&str, KubernetesVersion>,
) -> Result<Vec<KubeletVersions<'a>>, Error> {
    let mut versions = Vec::new();
    for node in nodes {
        let Some(expected) = node_pool(node).and_then(|pool| pool_versions.get(pool)) else {
            continue;
        };
        let Some(kubelet) = kubelet_version(node) else {
            continue;
        };
        versions.push(KubeletVersions {
            node: name_of(&node.metadata),
            kubelet: kubelet.parse()?,
            expected: *expected,
        });
    }
    Ok(versions)
}
