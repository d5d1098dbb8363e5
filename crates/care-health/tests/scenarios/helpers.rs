//! Test helpers for the scenario tests
//!
//! Provides an in-memory [`ResourceReader`] holding the objects of one
//! managed cluster and its control-plane namespace, plus builders for a
//! cluster that is healthy in every category.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentCondition, DeploymentStatus, StatefulSet, StatefulSetSpec,
    StatefulSetStatus,
};
use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeStatus, NodeSystemInfo};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;

use care_common::clock::FakeClock;
use care_common::config::CareConfig;
use care_common::crd::{
    Condition, ConditionStatus, Etcd, EtcdSpec, EtcdStatus, Machine, MachineCurrentStatus,
    MachineDeployment, MachineDeploymentSpec, MachineSpec, MachineStatus, ManagedCluster,
    ManagedResource, ManagedResourceSpec, ManagedResourceStatus, Worker, WorkerPool,
    MACHINE_NODE_LABEL, RESOURCES_APPLIED, RESOURCES_HEALTHY, RESOURCES_PROGRESSING,
};
use care_common::{Error, ROLE_LABEL_KEY, WORKER_POOL_LABEL};
use care_health::{Health, ResourceReader};

/// Control-plane namespace of the test cluster
pub const NAMESPACE: &str = "shoot--garden--dev";

/// Role label values used by the selectors
pub const ROLE_CONTROL_PLANE: &str = "controlplane";
pub const ROLE_MONITORING: &str = "monitoring";
pub const ROLE_LOGGING: &str = "logging";

/// Objects of one managed cluster, served from memory
#[derive(Clone, Default)]
pub struct ClusterState {
    pub deployments: Vec<Deployment>,
    pub stateful_sets: Vec<StatefulSet>,
    pub etcds: Vec<Etcd>,
    pub workers: Vec<Worker>,
    pub machines: Vec<Machine>,
    pub machine_deployments: Vec<MachineDeployment>,
    pub managed_resources: Vec<ManagedResource>,
    pub nodes: Vec<Node>,
    pub validating_webhooks: Vec<ValidatingWebhookConfiguration>,
    pub mutating_webhooks: Vec<MutatingWebhookConfiguration>,
    pub healthz_status: u16,
}

fn in_namespace<K: Resource + Clone>(objects: &[K], namespace: &str) -> Vec<K> {
    objects
        .iter()
        .filter(|o| o.meta().namespace.as_deref() == Some(namespace))
        .cloned()
        .collect()
}

/// Only `key=value` selectors are used by the engine
fn matches_selector(meta: &ObjectMeta, selector: &str) -> bool {
    let Some((key, value)) = selector.split_once('=') else {
        return false;
    };
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .is_some_and(|v| v == value)
}

#[async_trait]
impl ResourceReader for ClusterState {
    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, Error> {
        Ok(in_namespace(&self.deployments, namespace)
            .into_iter()
            .filter(|d| matches_selector(&d.metadata, selector))
            .collect())
    }

    async fn list_stateful_sets(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<StatefulSet>, Error> {
        Ok(in_namespace(&self.stateful_sets, namespace)
            .into_iter()
            .filter(|s| matches_selector(&s.metadata, selector))
            .collect())
    }

    async fn list_etcds(&self, namespace: &str) -> Result<Vec<Etcd>, Error> {
        Ok(in_namespace(&self.etcds, namespace))
    }

    async fn list_workers(&self, namespace: &str) -> Result<Vec<Worker>, Error> {
        Ok(in_namespace(&self.workers, namespace))
    }

    async fn list_machines(&self, namespace: &str) -> Result<Vec<Machine>, Error> {
        Ok(in_namespace(&self.machines, namespace))
    }

    async fn list_machine_deployments(
        &self,
        namespace: &str,
    ) -> Result<Vec<MachineDeployment>, Error> {
        Ok(in_namespace(&self.machine_deployments, namespace))
    }

    async fn list_managed_resources(
        &self,
        namespace: &str,
    ) -> Result<Vec<ManagedResource>, Error> {
        Ok(in_namespace(&self.managed_resources, namespace))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, Error> {
        Ok(self.nodes.clone())
    }

    async fn list_validating_webhook_configurations(
        &self,
    ) -> Result<Vec<ValidatingWebhookConfiguration>, Error> {
        Ok(self.validating_webhooks.clone())
    }

    async fn list_mutating_webhook_configurations(
        &self,
    ) -> Result<Vec<MutatingWebhookConfiguration>, Error> {
        Ok(self.mutating_webhooks.clone())
    }

    async fn api_server_healthz(&self) -> Result<u16, Error> {
        Ok(self.healthz_status)
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Clock frozen at a fixed instant
pub fn test_clock() -> FakeClock {
    FakeClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap())
}

/// Evaluator over `state` with `config`
pub fn health(state: ClusterState, clock: &FakeClock, config: CareConfig) -> Health {
    Health::new(Arc::new(state), Arc::new(clock.clone()), config)
}

fn meta(name: &str, role: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        generation: Some(1),
        labels: role.map(|role| BTreeMap::from([(ROLE_LABEL_KEY.to_string(), role.to_string())])),
        ..Default::default()
    }
}

/// Deployment in the control-plane namespace with the given role
pub fn deployment(name: &str, role: &str, available: bool) -> Deployment {
    Deployment {
        metadata: meta(name, Some(role)),
        status: Some(DeploymentStatus {
            observed_generation: Some(1),
            conditions: Some(vec![DeploymentCondition {
                type_: "Available".to_string(),
                status: if available { "True" } else { "False" }.to_string(),
                reason: Some("MinimumReplicasAvailable".to_string()),
                message: Some("Deployment has minimum availability.".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Stateful set in the control-plane namespace with the given role
pub fn stateful_set(name: &str, role: &str, ready: i32) -> StatefulSet {
    StatefulSet {
        metadata: meta(name, Some(role)),
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            ..Default::default()
        }),
        status: Some(StatefulSetStatus {
            observed_generation: Some(1),
            ready_replicas: Some(ready),
            ..Default::default()
        }),
    }
}

/// Etcd cluster in the control-plane namespace
pub fn etcd(name: &str, ready: bool, last_error: Option<&str>) -> Etcd {
    let mut etcd = Etcd::new(name, EtcdSpec { replicas: 3 });
    etcd.metadata = meta(name, None);
    etcd.status = Some(EtcdStatus {
        ready: Some(ready),
        last_error: last_error.map(str::to_string),
        observed_generation: Some(1),
    });
    etcd
}

/// Ready node of a worker pool
pub fn node(name: &str, pool: &str, kubelet: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                WORKER_POOL_LABEL.to_string(),
                pool.to_string(),
            )])),
            ..Default::default()
        },
        spec: None,
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                reason: Some("KubeletReady".to_string()),
                ..Default::default()
            }]),
            node_info: Some(NodeSystemInfo {
                kubelet_version: format!("v{kubelet}"),
                ..Default::default()
            }),
            ..Default::default()
        }),
    }
}

/// Machine in the given phase, optionally backing a node
pub fn machine(name: &str, phase: &str, node: Option<&str>) -> Machine {
    let mut machine = Machine::new(name, MachineSpec::default());
    machine.metadata = meta(name, None);
    machine.metadata.labels =
        node.map(|node| BTreeMap::from([(MACHINE_NODE_LABEL.to_string(), node.to_string())]));
    machine.status = Some(MachineStatus {
        current_status: MachineCurrentStatus {
            phase: phase.to_string(),
        },
    });
    machine
}

/// Machine deployment with the given replicas
pub fn machine_deployment(name: &str, replicas: i32) -> MachineDeployment {
    let mut md = MachineDeployment::new(name, MachineDeploymentSpec { replicas });
    md.metadata = meta(name, None);
    md
}

/// Managed resource with all sub-conditions healthy
pub fn healthy_managed_resource(name: &str, clock: &FakeClock) -> ManagedResource {
    let mut mr = ManagedResource::new(name, ManagedResourceSpec::default());
    mr.metadata = meta(name, None);
    mr.status = Some(ManagedResourceStatus {
        observed_generation: 1,
        conditions: vec![
            Condition::new(clock, RESOURCES_APPLIED, ConditionStatus::True, "ApplySucceeded", ""),
            Condition::new(clock, RESOURCES_HEALTHY, ConditionStatus::True, "ResourcesHealthy", ""),
            Condition::new(
                clock,
                RESOURCES_PROGRESSING,
                ConditionStatus::False,
                "ResourcesRolledOut",
                "",
            ),
        ],
    });
    mr
}

/// Cluster with a single static worker pool of `size` nodes
pub fn cluster(size: i32) -> ManagedCluster {
    ManagedCluster {
        name: "dev".to_string(),
        control_plane_namespace: NAMESPACE.to_string(),
        kubernetes_version: "1.30.4".to_string(),
        workers: vec![WorkerPool {
            name: "worker".to_string(),
            minimum: size,
            maximum: size,
            kubernetes_version: None,
        }],
        ..Default::default()
    }
}

/// Every object a healthy cluster from [`cluster`] needs
pub fn healthy_state(size: i32, clock: &FakeClock) -> ClusterState {
    let nodes = (0..size)
        .map(|i| node(&format!("node-{i}"), "worker", "1.30.4"))
        .collect();
    let machines = (0..size)
        .map(|i| machine(&format!("machine-{i}"), "Running", Some(&format!("node-{i}"))))
        .collect();

    ClusterState {
        deployments: vec![
            deployment("gardener-resource-manager", ROLE_CONTROL_PLANE, true),
            deployment("kube-apiserver", ROLE_CONTROL_PLANE, true),
            deployment("kube-controller-manager", ROLE_CONTROL_PLANE, true),
            deployment("kube-scheduler", ROLE_CONTROL_PLANE, true),
            deployment("plutono", ROLE_MONITORING, true),
            deployment("kube-state-metrics", ROLE_MONITORING, true),
        ],
        stateful_sets: vec![
            stateful_set("prometheus-shoot", ROLE_MONITORING, 1),
            stateful_set("vali", ROLE_LOGGING, 1),
        ],
        etcds: vec![etcd("etcd-main", true, None), etcd("etcd-events", true, None)],
        machines,
        machine_deployments: vec![machine_deployment("worker-z1", size)],
        managed_resources: vec![healthy_managed_resource("shoot-core", clock)],
        nodes,
        healthz_status: 200,
        ..Default::default()
    }
}

/// Find a condition by type, panicking with the list of types otherwise
pub fn condition<'a>(conditions: &'a [Condition], type_: &str) -> &'a Condition {
    conditions
        .iter()
        .find(|c| c.type_ == type_)
        .unwrap_or_else(|| {
            let types: Vec<_> = conditions.iter().map(|c| c.type_.as_str()).collect();
            panic!("condition {type_} not found in {types:?}")
        })
}
