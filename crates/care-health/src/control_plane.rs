//! Control-plane, monitoring and logging checks
//!
//! Each check lists the components of one category in the control-plane
//! namespace, then verifies presence before health, deployments before
//! stateful sets and etcds. The first problem found is reported.

use kube::Resource;
use tracing::instrument;

use care_common::crd::{Condition, ManagedCluster};
use care_common::kube_utils::name_of;
use care_common::{Error, CONTROL_PLANE_SELECTOR, LOGGING_SELECTOR, MONITORING_SELECTOR};

use crate::checker::{CheckPipeline, HealthChecker};
use crate::predicates::{check_deployment, check_etcd, check_stateful_set, HealthResult};
use crate::required::{self, RequiredSet};

/// Reason when required deployments are missing
pub const REASON_DEPLOYMENT_MISSING: &str = "DeploymentMissing";
/// Reason when a deployment is unhealthy
pub const REASON_DEPLOYMENT_UNHEALTHY: &str = "DeploymentUnhealthy";
/// Reason when required stateful sets are missing
pub const REASON_STATEFUL_SET_MISSING: &str = "StatefulSetMissing";
/// Reason when a stateful set is unhealthy
pub const REASON_STATEFUL_SET_UNHEALTHY: &str = "StatefulSetUnhealthy";
/// Reason when required etcds are missing
pub const REASON_ETCD_MISSING: &str = "EtcdMissing";
/// Reason when an etcd is unhealthy
pub const REASON_ETCD_UNHEALTHY: &str = "EtcdUnhealthy";

fn names<K: Resource>(objects: &[K]) -> Vec<&str> {
    objects.iter().map(|o| name_of(o.meta())).collect()
}

impl HealthChecker {
    /// Fail if any required name is absent; names are listed sorted
    pub(crate) fn check_required_present(
        &self,
        condition: &Condition,
        reason: &str,
        kind: &str,
        required: &RequiredSet,
        present: Vec<&str>,
    ) -> Option<Condition> {
        let missing = required::missing(required, present);
        if missing.is_empty() {
            return None;
        }
        Some(self.failed_condition(
            condition,
            reason,
            &format!("Missing required {kind}: {}", missing.join(", ")),
            Vec::new(),
        ))
    }

    /// Fail on the first object its predicate rejects
    pub(crate) fn check_each_healthy<K: Resource>(
        &self,
        condition: &Condition,
        reason: &str,
        kind: &str,
        objects: &[K],
        predicate: fn(&K) -> HealthResult,
    ) -> Option<Condition> {
        objects.iter().find_map(|object| {
            predicate(object).err().map(|unhealthy| {
                self.failed_condition(
                    condition,
                    reason,
                    &format!(
                        "{kind} {:?} is unhealthy: {}",
                        name_of(object.meta()),
                        unhealthy.message
                    ),
                    unhealthy.codes,
                )
            })
        })
    }

    /// Check the control-plane deployments and etcds
    ///
    /// Returns `None` when healthy, an exit condition otherwise.
    #[instrument(skip_all, fields(cluster = %cluster.name))]
    pub async fn check_control_plane(
        &self,
        cluster: &ManagedCluster,
        condition: &Condition,
    ) -> Result<Option<Condition>, Error> {
        let namespace = &cluster.control_plane_namespace;

        let workers = if cluster.is_workerless() {
            Vec::new()
        } else {
            self.reader.list_workers(namespace).await?
        };
        let required_deployments = required::control_plane_deployments(
            cluster,
            &workers,
            &self.config.feature_gates,
        )?;
        let required_etcds = required::control_plane_etcds();

        let deployments = self
            .reader
            .list_deployments(namespace, CONTROL_PLANE_SELECTOR)
            .await?;
        let etcds = self.reader.list_etcds(namespace).await?;

        CheckPipeline::new()
            .step("required deployments", || {
                self.check_required_present(
                    condition,
                    REASON_DEPLOYMENT_MISSING,
                    "deployments",
                    &required_deployments,
                    names(&deployments),
                )
            })
            .step("deployment health", || {
                self.check_each_healthy(
                    condition,
                    REASON_DEPLOYMENT_UNHEALTHY,
                    "Deployment",
                    &deployments,
                    check_deployment,
                )
            })
            .step("required etcds", || {
                self.check_required_present(
                    condition,
                    REASON_ETCD_MISSING,
                    "etcds",
                    &required_etcds,
                    names(&etcds),
                )
            })
            .step("etcd health", || {
                self.check_each_healthy(condition, REASON_ETCD_UNHEALTHY, "Etcd", &etcds, check_etcd)
            })
            .run()
    }

    /// Check the monitoring deployments and stateful sets
    #[instrument(skip_all, fields(cluster = %cluster.name))]
    pub async fn check_monitoring_control_plane(
        &self,
        cluster: &ManagedCluster,
        condition: &Condition,
    ) -> Result<Option<Condition>, Error> {
        let namespace = &cluster.control_plane_namespace;
        let required_deployments = required::monitoring_deployments(cluster);
        let required_stateful_sets =
            required::monitoring_stateful_sets(&self.config.observability);

        let deployments = self
            .reader
            .list_deployments(namespace, MONITORING_SELECTOR)
            .await?;
        let stateful_sets = self
            .reader
            .list_stateful_sets(namespace, MONITORING_SELECTOR)
            .await?;

        CheckPipeline::new()
            .step("required deployments", || {
                self.check_required_present(
                    condition,
                    REASON_DEPLOYMENT_MISSING,
                    "deployments",
                    &required_deployments,
                    names(&deployments),
                )
            })
            .step("deployment health", || {
                self.check_each_healthy(
                    condition,
                    REASON_DEPLOYMENT_UNHEALTHY,
                    "Deployment",
                    &deployments,
                    check_deployment,
                )
            })
            .step("required stateful sets", || {
                self.check_required_present(
                    condition,
                    REASON_STATEFUL_SET_MISSING,
                    "stateful sets",
                    &required_stateful_sets,
                    names(&stateful_sets),
                )
            })
            .step("stateful set health", || {
                self.check_each_healthy(
                    condition,
                    REASON_STATEFUL_SET_UNHEALTHY,
                    "StatefulSet",
                    &stateful_sets,
                    check_stateful_set,
                )
            })
            .run()
    }

    /// Check the logging stateful sets and deployments
    ///
    /// Testing clusters run without logging and always pass.
    #[instrument(skip_all, fields(cluster = %cluster.name))]
    pub async fn check_logging_control_plane(
        &self,
        cluster: &ManagedCluster,
        condition: &Condition,
    ) -> Result<Option<Condition>, Error> {
        if cluster.is_testing() {
            return Ok(None);
        }

        let namespace = &cluster.control_plane_namespace;
        let required_stateful_sets =
            required::logging_stateful_sets(cluster, &self.config.observability);
        let required_deployments = required::logging_deployments(cluster, &self.config.observability);

        let stateful_sets = self
            .reader
            .list_stateful_sets(namespace, LOGGING_SELECTOR)
            .await?;
        let deployments = if required_deployments.is_empty() {
            Vec::new()
        } else {
            self.reader
                .list_deployments(namespace, LOGGING_SELECTOR)
                .await?
        };

        CheckPipeline::new()
            .step("required stateful sets", || {
                self.check_required_present(
                    condition,
                    REASON_STATEFUL_SET_MISSING,
                    "stateful sets",
                    &required_stateful_sets,
                    names(&stateful_sets),
                )
            })
            .step("stateful set health", || {
                self.check_each_healthy(
                    condition,
                    REASON_STATEFUL_SET_UNHEALTHY,
                    "StatefulSet",
                    &stateful_sets,
                    check_stateful_set,
                )
            })
            .step("required deployments", || {
                self.check_required_present(
                    condition,
                    REASON_DEPLOYMENT_MISSING,
                    "deployments",
                    &required_deployments,
                    names(&deployments),
                )
            })
            .step("deployment health", || {
                self.check_each_healthy(
                    condition,
                    REASON_DEPLOYMENT_UNHEALTHY,
                    "Deployment",
                    &deployments,
                    check_deployment,
                )
            })
            .run()
    }
}
