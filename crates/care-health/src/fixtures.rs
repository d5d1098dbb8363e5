//! Object builders shared by the unit tests of this crate

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentCondition, DeploymentStatus, StatefulSet, StatefulSetSpec,
    StatefulSetStatus,
};
use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeSpec, NodeStatus, NodeSystemInfo};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use care_common::clock::FakeClock;
use care_common::config::CareConfig;
use care_common::crd::{
    Etcd, EtcdSpec, EtcdStatus, Machine, MachineCurrentStatus, MachineDeployment,
    MachineDeploymentSpec, MachineSpec, MachineStatus, ManagedCluster, WorkerPool,
    MACHINE_NODE_LABEL,
};
use care_common::WORKER_POOL_LABEL;

use crate::checker::HealthChecker;
use crate::reader::MockResourceReader;

pub const NAMESPACE: &str = "shoot--dev";

pub fn fake_clock() -> FakeClock {
    FakeClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap())
}

pub fn checker(reader: MockResourceReader, clock: &FakeClock, config: &CareConfig) -> HealthChecker {
    HealthChecker::new(Arc::new(reader), Arc::new(clock.clone()), config, None)
}

pub fn pool(name: &str, minimum: i32, maximum: i32) -> WorkerPool {
    WorkerPool {
        name: name.to_string(),
        minimum,
        maximum,
        kubernetes_version: None,
    }
}

pub fn cluster(workers: Vec<WorkerPool>) -> ManagedCluster {
    ManagedCluster {
        name: "dev".to_string(),
        control_plane_namespace: NAMESPACE.to_string(),
        kubernetes_version: "1.30.4".to_string(),
        workers,
        ..Default::default()
    }
}

fn named(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        generation: Some(1),
        ..Default::default()
    }
}

pub fn deployment(name: &str, available: bool) -> Deployment {
    Deployment {
        metadata: named(name),
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

pub fn stateful_set(name: &str, desired: i32, ready: i32) -> StatefulSet {
    StatefulSet {
        metadata: named(name),
        spec: Some(StatefulSetSpec {
            replicas: Some(desired),
            ..Default::default()
        }),
        status: Some(StatefulSetStatus {
            observed_generation: Some(1),
            ready_replicas: Some(ready),
            ..Default::default()
        }),
    }
}

pub fn etcd(name: &str, ready: bool, last_error: Option<&str>) -> Etcd {
    let mut etcd = Etcd::new(name, EtcdSpec { replicas: 1 });
    etcd.status = Some(EtcdStatus {
        ready: Some(ready),
        last_error: last_error.map(str::to_string),
        observed_generation: Some(1),
    });
    etcd
}

/// A ready, schedulable node in `pool` running kubelet `version`
pub fn node(name: &str, pool: &str, version: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                WORKER_POOL_LABEL.to_string(),
                pool.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(NodeSpec::default()),
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                reason: Some("KubeletReady".to_string()),
                message: Some("kubelet is posting ready status".to_string()),
                ..Default::default()
            }]),
            node_info: Some(NodeSystemInfo {
                kubelet_version: format!("v{version}"),
                ..Default::default()
            }),
            ..Default::default()
        }),
    }
}

pub fn not_ready(mut node: Node) -> Node {
    if let Some(conditions) = node.status.as_mut().and_then(|s| s.conditions.as_mut()) {
        conditions[0].status = "False".to_string();
        conditions[0].reason = Some("KubeletNotReady".to_string());
    }
    node
}

pub fn cordoned(mut node: Node) -> Node {
    node.spec = Some(NodeSpec {
        unschedulable: Some(true),
        ..Default::default()
    });
    node
}

pub fn with_annotation(mut node: Node, key: &str, value: &str) -> Node {
    node.metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
    node
}

pub fn machine(name: &str, phase: &str, node: Option<&str>) -> Machine {
    let mut machine = Machine::new(name, MachineSpec::default());
    machine.metadata.namespace = Some(NAMESPACE.to_string());
    machine.status = Some(MachineStatus {
        current_status: MachineCurrentStatus {
            phase: phase.to_string(),
        },
    });
    if let Some(node) = node {
        machine.metadata.labels = Some(BTreeMap::from([(
            MACHINE_NODE_LABEL.to_string(),
            node.to_string(),
        )]));
    }
    machine
}

pub fn machine_deployment(name: &str, replicas: i32) -> MachineDeployment {
    let mut md = MachineDeployment::new(name, MachineDeploymentSpec { replicas });
    md.metadata.namespace = Some(NAMESPACE.to_string());
    md
}
