//! Required component sets
//!
//! The names that must exist per health category, recomputed from the
//! cluster definition and configuration on every evaluation.

use std::collections::BTreeSet;

use care_common::config::{FeatureGates, ObservabilityConfig};
use care_common::crd::{ManagedCluster, Worker};
use care_common::Error;

/// Resource manager applying managed resources
pub const RESOURCE_MANAGER: &str = "gardener-resource-manager";
/// Kubernetes API server
pub const KUBE_APISERVER: &str = "kube-apiserver";
/// Kubernetes controller manager
pub const KUBE_CONTROLLER_MANAGER: &str = "kube-controller-manager";
/// Kubernetes scheduler
pub const KUBE_SCHEDULER: &str = "kube-scheduler";
/// Cluster autoscaler
pub const CLUSTER_AUTOSCALER: &str = "cluster-autoscaler";
/// Vertical pod autoscaler admission controller
pub const VPA_ADMISSION_CONTROLLER: &str = "vpa-admission-controller";
/// Vertical pod autoscaler recommender
pub const VPA_RECOMMENDER: &str = "vpa-recommender";
/// Vertical pod autoscaler updater
pub const VPA_UPDATER: &str = "vpa-updater";
/// Machine controller manager
pub const MACHINE_CONTROLLER_MANAGER: &str = "machine-controller-manager";

/// Main etcd cluster
pub const ETCD_MAIN: &str = "etcd-main";
/// Events etcd cluster
pub const ETCD_EVENTS: &str = "etcd-events";

/// Dashboards
pub const PLUTONO: &str = "plutono";
/// Cluster state exporter
pub const KUBE_STATE_METRICS: &str = "kube-state-metrics";
/// Prometheus scraping the managed cluster
pub const PROMETHEUS: &str = "prometheus-shoot";
/// Alertmanager for the managed cluster
pub const ALERTMANAGER: &str = "alertmanager-shoot";

/// Log aggregation
pub const VALI: &str = "vali";
/// Event logger
pub const EVENT_LOGGER: &str = "event-logger";

/// Set of required resource names
pub type RequiredSet = BTreeSet<String>;

fn set_of<'a>(names: impl IntoIterator<Item = &'a str>) -> RequiredSet {
    names.into_iter().map(str::to_string).collect()
}

/// Deployments that must exist in the control-plane namespace
///
/// Workerless clusters only need the core components. The autoscaler is
/// not required while any worker is mid rolling update, since it is scaled
/// down for the duration.
pub fn control_plane_deployments(
    cluster: &ManagedCluster,
    workers: &[Worker],
    feature_gates: &FeatureGates,
) -> Result<RequiredSet, Error> {
    let mut required = set_of([RESOURCE_MANAGER, KUBE_APISERVER, KUBE_CONTROLLER_MANAGER]);
    if cluster.is_workerless() {
        return Ok(required);
    }

    required.insert(KUBE_SCHEDULER.to_string());

    if cluster.wants_cluster_autoscaler()? && !workers.iter().any(Worker::is_rolling_update) {
        required.insert(CLUSTER_AUTOSCALER.to_string());
    }

    if cluster.vertical_pod_autoscaler_enabled {
        required.extend(set_of([VPA_ADMISSION_CONTROLLER, VPA_RECOMMENDER, VPA_UPDATER]));
    }

    if feature_gates.machine_controller_manager_deployment {
        required.insert(MACHINE_CONTROLLER_MANAGER.to_string());
    }

    Ok(required)
}

/// Etcd clusters that must exist in the control-plane namespace
pub fn control_plane_etcds() -> RequiredSet {
    set_of([ETCD_MAIN, ETCD_EVENTS])
}

/// Monitoring deployments
pub fn monitoring_deployments(cluster: &ManagedCluster) -> RequiredSet {
    let mut required = set_of([PLUTONO]);
    if !cluster.is_workerless() {
        required.insert(KUBE_STATE_METRICS.to_string());
    }
    required
}

/// Monitoring stateful sets
pub fn monitoring_stateful_sets(observability: &ObservabilityConfig) -> RequiredSet {
    let mut required = set_of([PROMETHEUS]);
    if observability.alertmanager_enabled {
        required.insert(ALERTMANAGER.to_string());
    }
    required
}

/// Logging stateful sets; none for testing clusters
pub fn logging_stateful_sets(
    cluster: &ManagedCluster,
    observability: &ObservabilityConfig,
) -> RequiredSet {
    if cluster.is_testing() || !observability.vali_enabled {
        return RequiredSet::new();
    }
    set_of([VALI])
}

/// Logging deployments; none for testing clusters
pub fn logging_deployments(
    cluster: &ManagedCluster,
    observability: &ObservabilityConfig,
) -> RequiredSet {
    if cluster.is_testing() || !observability.event_logging_enabled {
        return RequiredSet::new();
    }
    set_of([EVENT_LOGGER])
}

/// Required names absent from `present`, in sorted order
pub fn missing<'a, I>(required: &RequiredSet, present: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: BTreeSet<&str> = present.into_iter().collect();
    required
        .iter()
        .filter(|name| !present.contains(name.as_str()))
        .cloned()
        .collect()
}
