//! Health evaluation of one managed cluster
//!
//! [`Health::check`] derives every health condition from its previous value
//! and the current state of the cluster. Categories are evaluated
//! concurrently; each owns its own condition, so nothing is shared between
//! them besides the read-only reader, clock and configuration.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use care_common::clock::Clock;
use care_common::config::CareConfig;
use care_common::crd::{
    condition_or_unknown, get_or_init_condition, Condition, ConditionStatus, ExtensionCondition,
    ManagedCluster, API_SERVER_AVAILABLE, CONTROL_PLANE_HEALTHY, EVERY_NODE_READY,
    HIBERNATION_POSSIBLE, OBSERVABILITY_COMPONENTS_HEALTHY, SYSTEM_COMPONENTS_HEALTHY,
};
use care_common::Error;

use crate::checker::{pardon_conditions, HealthChecker};
use crate::reader::ResourceReader;

/// Reason for conditions skipped while the cluster is hibernated
pub const REASON_CONDITION_NOT_CHECKED: &str = "ConditionNotChecked";
/// Reason for a healthy control plane
pub const REASON_CONTROL_PLANE_RUNNING: &str = "ControlPlaneRunning";
/// Reason for healthy observability components
pub const REASON_OBSERVABILITY_RUNNING: &str = "ObservabilityComponentsRunning";
/// Reason for healthy worker nodes
pub const REASON_EVERY_NODE_READY: &str = "EveryNodeReady";
/// Reason for healthy system components
pub const REASON_SYSTEM_COMPONENTS_RUNNING: &str = "SystemComponentsRunning";

const HIBERNATED_MESSAGE: &str = "Shoot cluster has been hibernated.";

/// Health evaluator for managed clusters
pub struct Health {
    reader: Arc<dyn ResourceReader>,
    clock: Arc<dyn Clock>,
    config: CareConfig,
}

impl Health {
    /// Create an evaluator
    pub fn new(reader: Arc<dyn ResourceReader>, clock: Arc<dyn Clock>, config: CareConfig) -> Self {
        Self {
            reader,
            clock,
            config,
        }
    }

    fn checker(&self, cluster: &ManagedCluster) -> HealthChecker {
        HealthChecker::new(
            self.reader.clone(),
            self.clock.clone(),
            &self.config,
            cluster.last_operation.clone(),
        )
    }

    /// Evaluate all health conditions of a cluster
    ///
    /// Returns `APIServerAvailable`, `ControlPlaneHealthy`,
    /// `ObservabilityComponentsHealthy`, `EveryNodeReady` (omitted for
    /// workerless clusters) and `SystemComponentsHealthy`, in that order.
    /// Conditions missing from `conditions` start out initialized.
    #[instrument(skip_all, fields(cluster = %cluster.name))]
    pub async fn check(
        &self,
        cluster: &ManagedCluster,
        conditions: &[Condition],
        extension_conditions: &[ExtensionCondition],
    ) -> Vec<Condition> {
        let clock = self.clock.as_ref();
        let api_server = get_or_init_condition(clock, conditions, API_SERVER_AVAILABLE);
        let control_plane = get_or_init_condition(clock, conditions, CONTROL_PLANE_HEALTHY);
        let observability =
            get_or_init_condition(clock, conditions, OBSERVABILITY_COMPONENTS_HEALTHY);
        let nodes = (!cluster.is_workerless())
            .then(|| get_or_init_condition(clock, conditions, EVERY_NODE_READY));
        let system_components =
            get_or_init_condition(clock, conditions, SYSTEM_COMPONENTS_HEALTHY);

        if cluster.is_hibernation_active() {
            info!("cluster is hibernated, skipping health checks");
            return in_order(api_server, control_plane, observability, nodes, system_components)
                .into_iter()
                .map(|c| {
                    c.updated(
                        clock,
                        ConditionStatus::True,
                        REASON_CONDITION_NOT_CHECKED,
                        HIBERNATED_MESSAGE,
                        Vec::new(),
                    )
                })
                .collect();
        }

        let checker = self.checker(cluster);
        let (api_server, control_plane, observability, system_components, nodes) = futures::join!(
            checker.check_api_server_availability(&api_server),
            async {
                let result = checker.check_control_plane(cluster, &control_plane).await;
                finish(
                    &checker,
                    &control_plane,
                    result,
                    extension_conditions,
                    REASON_CONTROL_PLANE_RUNNING,
                    "All control plane components are healthy.",
                )
            },
            self.check_observability(&checker, cluster, &observability, extension_conditions),
            async {
                let result = checker
                    .check_system_components(cluster, &system_components)
                    .await;
                finish(
                    &checker,
                    &system_components,
                    result,
                    extension_conditions,
                    REASON_SYSTEM_COMPONENTS_RUNNING,
                    "All system components are healthy.",
                )
            },
            async {
                match &nodes {
                    Some(condition) => {
                        let result = checker.check_cluster_nodes(cluster, condition).await;
                        Some(finish(
                            &checker,
                            condition,
                            result,
                            extension_conditions,
                            REASON_EVERY_NODE_READY,
                            "All nodes are ready.",
                        ))
                    }
                    None => None,
                }
            },
        );

        pardon_conditions(
            clock,
            in_order(api_server, control_plane, observability, nodes, system_components),
            cluster.last_operation.as_ref(),
            &cluster.last_errors,
        )
    }

    async fn check_observability(
        &self,
        checker: &HealthChecker,
        cluster: &ManagedCluster,
        condition: &Condition,
        extension_conditions: &[ExtensionCondition],
    ) -> Condition {
        if !self.config.observability.monitoring_enabled || cluster.is_testing() {
            return checker.healthy_condition(
                condition,
                REASON_OBSERVABILITY_RUNNING,
                "Observability components are not checked.",
            );
        }

        let result = match checker.check_monitoring_control_plane(cluster, condition).await {
            Ok(None) => checker.check_logging_control_plane(cluster, condition).await,
            other => other,
        };
        finish(
            checker,
            condition,
            result,
            extension_conditions,
            REASON_OBSERVABILITY_RUNNING,
            "All observability components are healthy.",
        )
    }

    /// Evaluate the constraints of a cluster
    ///
    /// Hibernated clusters cannot be inspected, so their constraints are
    /// returned unchanged.
    #[instrument(skip_all, fields(cluster = %cluster.name))]
    pub async fn check_constraints(
        &self,
        cluster: &ManagedCluster,
        constraints: &[Condition],
    ) -> Vec<Condition> {
        let clock = self.clock.as_ref();
        let hibernation_possible = get_or_init_condition(clock, constraints, HIBERNATION_POSSIBLE);
        if cluster.is_hibernated {
            return vec![hibernation_possible];
        }

        let result = self
            .checker(cluster)
            .check_for_problematic_webhooks(&hibernation_possible)
            .await;
        if let Err(e) = &result {
            log_check_error(HIBERNATION_POSSIBLE, e);
        }
        vec![condition_or_unknown(clock, &hibernation_possible, result)]
    }
}

fn in_order(
    api_server: Condition,
    control_plane: Condition,
    observability: Condition,
    nodes: Option<Condition>,
    system_components: Condition,
) -> Vec<Condition> {
    [Some(api_server), Some(control_plane), Some(observability), nodes, Some(system_components)]
        .into_iter()
        .flatten()
        .collect()
}

/// Errors that will not clear up on their own need an operator
fn log_check_error(condition: &str, e: &Error) {
    if e.is_retryable() {
        warn!(condition, error = %e, "health check failed, retrying on next evaluation");
    } else {
        error!(condition, error = %e, "health check failed, configuration needs a fix");
    }
}

/// Turn a category result into the condition to report
///
/// An exit condition wins, then failing extension reports, then healthy.
/// Errors yield `Unknown`.
fn finish(
    checker: &HealthChecker,
    condition: &Condition,
    result: Result<Option<Condition>, Error>,
    extension_conditions: &[ExtensionCondition],
    healthy_reason: &str,
    healthy_message: &str,
) -> Condition {
    let result = result.map(|exit| {
        exit.or_else(|| checker.check_extension_conditions(condition, extension_conditions))
            .unwrap_or_else(|| checker.healthy_condition(condition, healthy_reason, healthy_message))
    });
    if let Err(e) = &result {
        log_check_error(&condition.type_, e);
    }
    condition_or_unknown(checker.clock(), condition, result)
}
