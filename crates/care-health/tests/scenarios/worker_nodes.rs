//! Worker node stories
//!
//! `EveryNodeReady` tells an operator whether the nodes match what their
//! worker pools ask for. Scale operations in flight are expected and show
//! up as `Progressing`; inconsistent machine state is a failure.

use care_common::config::CareConfig;
use care_common::crd::{Condition, ConditionStatus, ExtensionCondition, EVERY_NODE_READY};
use care_common::kube_utils::ANNOTATION_CLOUD_CONFIG_CHECKSUM;
use care_health::{check_nodes_scaling_up, ScalingIssue};

use crate::helpers::*;

/// Story: the pool was scaled from one to two nodes and the new machine is
/// still being provisioned
#[tokio::test]
async fn story_scale_up_in_flight() {
    let clock = test_clock();
    let mut state = healthy_state(1, &clock);
    state.machine_deployments = vec![machine_deployment("worker-z1", 2)];
    state.machines.push(machine("machine-new", "Pending", None));

    let mut c = cluster(1);
    c.workers[0].maximum = 2;

    let conditions = health(state, &clock, CareConfig::default())
        .check(&c, &[], &[])
        .await;
    let nodes = condition(&conditions, EVERY_NODE_READY);
    assert_eq!(nodes.status, ConditionStatus::Progressing);
    assert_eq!(nodes.reason, "NodesScalingUp");
    assert!(nodes
        .message
        .contains("provisioning and should join the cluster soon"));
}

#[test]
fn pending_machines_are_a_transient_scale_up() {
    let machines = vec![
        machine("m1", "Pending", None),
        machine("m2", "Pending", None),
    ];
    let issue = check_nodes_scaling_up(&machines, 1, 2).unwrap_err();
    assert!(matches!(issue, ScalingIssue::Transient(_)));
    assert!(issue
        .message()
        .contains("provisioning and should join the cluster soon"));
    assert_eq!(check_nodes_scaling_up(&machines, 2, 2), Ok(()));
}

/// Story: a machine crashed during bootstrap; waiting will not help
#[tokio::test]
async fn story_erroneous_machine() {
    let clock = test_clock();
    let mut state = healthy_state(1, &clock);
    state.machine_deployments = vec![machine_deployment("worker-z1", 2)];
    state
        .machines
        .push(machine("machine-new", "CrashLoopBackOff", None));

    let mut c = cluster(1);
    c.workers[0].maximum = 2;
    c.last_operation = None;

    let conditions = health(state, &clock, CareConfig::default())
        .check(&c, &[], &[])
        .await;
    let nodes = condition(&conditions, EVERY_NODE_READY);
    // pardoned: no operation recorded yet
    assert_eq!(nodes.status, ConditionStatus::Progressing);
    assert_eq!(nodes.message, "1 machine is erroneous");
}

/// Story: a node runs an older patch release than its pool
#[tokio::test]
async fn story_kubelet_patch_drift() {
    let clock = test_clock();
    let mut state = healthy_state(2, &clock);
    state.nodes[1] = node("node-1", "worker", "1.30.2");

    let conditions = health(state, &clock, CareConfig::default())
        .check(&cluster(2), &[], &[])
        .await;
    let nodes = condition(&conditions, EVERY_NODE_READY);
    assert_eq!(nodes.reason, "KubeletVersionMismatch");
    assert!(nodes.message.contains("node-1"));
}

/// Story: a node still runs with the previous cloud config after the pool
/// was updated
#[tokio::test]
async fn story_outdated_cloud_config() {
    let clock = test_clock();
    let mut state = healthy_state(1, &clock);
    state.nodes[0]
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(ANNOTATION_CLOUD_CONFIG_CHECKSUM.to_string(), "old".to_string());

    let mut c = cluster(1);
    c.cloud_config_checksums
        .insert("worker".to_string(), "new".to_string());

    let conditions = health(state, &clock, CareConfig::default())
        .check(&c, &[], &[])
        .await;
    assert_eq!(
        condition(&conditions, EVERY_NODE_READY).reason,
        "CloudConfigOutdated"
    );
}

/// Story: the nodes look fine, but the worker extension reports a problem
/// with the machine images
#[tokio::test]
async fn story_extension_report_fails_healthy_nodes() {
    let clock = test_clock();
    let report = ExtensionCondition {
        condition: Condition::new(
            &clock,
            EVERY_NODE_READY,
            ConditionStatus::False,
            "ImageUnavailable",
            "machine image is deprecated",
        ),
        extension_type: "Worker".to_string(),
        extension_name: "dev".to_string(),
        extension_namespace: NAMESPACE.to_string(),
        last_heartbeat_time: None,
    };

    let conditions = health(healthy_state(1, &clock), &clock, CareConfig::default())
        .check(&cluster(1), &[], &[report])
        .await;
    let nodes = condition(&conditions, EVERY_NODE_READY);
    assert_eq!(nodes.reason, "WorkerUnhealthyReport");
    assert!(nodes.message.ends_with("machine image is deprecated"));
}
