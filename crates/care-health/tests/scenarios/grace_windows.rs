//! Grace window stories
//!
//! Operators configure a grace window per condition type so that short
//! blips show up as `Progressing` instead of paging someone. These stories
//! replay several evaluations while the fake clock moves forward.

use std::time::Duration;

use care_common::clock::{Clock, FakeClock};
use care_common::config::{CareConfig, ConditionThreshold, HealthCheckConfig};
use care_common::crd::{
    Condition, ConditionStatus, LastOperation, LastOperationState, LastOperationType,
    ManagedCluster, CONTROL_PLANE_HEALTHY,
};

use crate::helpers::*;

fn one_minute_window() -> CareConfig {
    CareConfig {
        health_checks: HealthCheckConfig {
            condition_thresholds: vec![ConditionThreshold {
                type_: CONTROL_PLANE_HEALTHY.to_string(),
                duration: Duration::from_secs(60),
            }],
            ..Default::default()
        },
        ..Default::default()
    }
}

fn reconciled(clock: &FakeClock, minutes_ago: i64) -> ManagedCluster {
    let mut c = cluster(1);
    c.last_operation = Some(LastOperation {
        type_: LastOperationType::Reconcile,
        state: LastOperationState::Succeeded,
        description: "Shoot cluster has been successfully reconciled.".to_string(),
        progress: 100,
        last_update_time: clock.now() - chrono::Duration::minutes(minutes_ago),
    });
    c
}

fn broken_scheduler(clock: &FakeClock) -> ClusterState {
    let mut state = healthy_state(1, clock);
    state
        .deployments
        .retain(|d| d.metadata.name.as_deref() != Some("kube-scheduler"));
    state
}

/// Story: the scheduler disappears from a healthy cluster. For one minute
/// the condition is Progressing, then it turns False, and once the
/// scheduler is back it is True again.
#[tokio::test]
async fn story_failure_progresses_then_fails_then_recovers() {
    let clock = test_clock();
    let cluster = reconciled(&clock, 60);
    let healthy = Condition::new(
        &clock,
        CONTROL_PLANE_HEALTHY,
        ConditionStatus::True,
        "ControlPlaneRunning",
        "All control plane components are healthy.",
    );

    clock.step(Duration::from_secs(10));
    let engine = health(broken_scheduler(&clock), &clock, one_minute_window());
    let first = engine.check(&cluster, &[healthy], &[]).await;
    let progressing = condition(&first, CONTROL_PLANE_HEALTHY).clone();
    assert_eq!(progressing.status, ConditionStatus::Progressing);
    assert_eq!(progressing.reason, "DeploymentMissing");
    assert_eq!(progressing.last_transition_time, clock.now());

    clock.step(Duration::from_secs(30));
    let second = engine.check(&cluster, &first, &[]).await;
    assert_eq!(
        condition(&second, CONTROL_PLANE_HEALTHY).status,
        ConditionStatus::Progressing
    );

    clock.step(Duration::from_secs(31));
    let third = engine.check(&cluster, &second, &[]).await;
    let failed = condition(&third, CONTROL_PLANE_HEALTHY);
    assert_eq!(failed.status, ConditionStatus::False);
    assert!(failed.message.contains("kube-scheduler"));

    clock.step(Duration::from_secs(60));
    let recovered = health(healthy_state(1, &clock), &clock, one_minute_window())
        .check(&cluster, &third, &[])
        .await;
    let recovered = condition(&recovered, CONTROL_PLANE_HEALTHY);
    assert_eq!(recovered.status, ConditionStatus::True);
    assert_eq!(recovered.last_transition_time, clock.now());
}

/// Story: without a configured window the same failure is False at once
#[tokio::test]
async fn story_no_window_fails_immediately() {
    let clock = test_clock();
    let cluster = reconciled(&clock, 60);
    let conditions = health(broken_scheduler(&clock), &clock, CareConfig::default())
        .check(&cluster, &[], &[])
        .await;
    assert_eq!(
        condition(&conditions, CONTROL_PLANE_HEALTHY).status,
        ConditionStatus::False
    );
}

/// Story: while the cluster is still being created, failures are expected
/// and pardoned
#[tokio::test]
async fn story_creation_in_progress_is_pardoned() {
    let clock = test_clock();
    let mut cluster = reconciled(&clock, 1);
    if let Some(op) = cluster.last_operation.as_mut() {
        op.type_ = LastOperationType::Create;
        op.state = LastOperationState::Processing;
    }

    let conditions = health(broken_scheduler(&clock), &clock, CareConfig::default())
        .check(&cluster, &[], &[])
        .await;
    let control_plane = condition(&conditions, CONTROL_PLANE_HEALTHY);
    assert_eq!(control_plane.status, ConditionStatus::Progressing);
    assert_eq!(control_plane.reason, "DeploymentMissing");

    cluster.last_operation = None;
    let conditions = health(broken_scheduler(&clock), &clock, CareConfig::default())
        .check(&cluster, &[], &[])
        .await;
    assert_eq!(
        condition(&conditions, CONTROL_PLANE_HEALTHY).status,
        ConditionStatus::Progressing
    );
}

/// Story: once creation succeeded, a broken component is a real failure
#[tokio::test]
async fn story_succeeded_create_is_not_pardoned() {
    let clock = test_clock();
    let mut cluster = reconciled(&clock, 60);
    if let Some(op) = cluster.last_operation.as_mut() {
        op.type_ = LastOperationType::Create;
    }
    let conditions = health(broken_scheduler(&clock), &clock, CareConfig::default())
        .check(&cluster, &[], &[])
        .await;
    assert_eq!(
        condition(&conditions, CONTROL_PLANE_HEALTHY).status,
        ConditionStatus::False
    );
}
