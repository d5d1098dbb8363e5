//! Health predicates for single resources
//!
//! Each predicate inspects the observed status of one object and either
//! accepts it or explains why it is unhealthy. They never touch the API.

use std::sync::LazyLock;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Node;
use regex::Regex;
use thiserror::Error;

use care_common::codes::{extract_error_codes, ErrorCode};
use care_common::crd::Etcd;
use care_common::kube_utils::{
    get_condition, node_conditions, HasConditionFields, CONDITION_AVAILABLE, CONDITION_PROGRESSING,
    CONDITION_READY, CONDITION_REPLICA_FAILURE, STATUS_FALSE, STATUS_TRUE,
};
use care_common::version::KubernetesVersion;

/// Node condition types that must not be `True` on a healthy node
pub const NODE_PRESSURE_CONDITIONS: [&str; 4] = [
    "DiskPressure",
    "MemoryPressure",
    "PIDPressure",
    "NetworkUnavailable",
];

static CONFIGURATION_PROBLEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(KubeletHasInsufficientMemory|KubeletHasDiskPressure|KubeletHasInsufficientPID)")
        .expect("node configuration problem pattern is static and valid")
});

/// Why a resource is unhealthy
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}")]
pub struct Unhealthy {
    /// Human-readable explanation
    pub message: String,
    /// Classified error codes
    pub codes: Vec<ErrorCode>,
}

impl Unhealthy {
    /// Unhealthy without error codes
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            codes: Vec::new(),
        }
    }

    /// Attach error codes
    pub fn with_codes(mut self, codes: Vec<ErrorCode>) -> Self {
        self.codes = codes;
        self
    }
}

/// Result of a single-resource health predicate
pub type HealthResult = Result<(), Unhealthy>;

fn outdated_generation(observed: Option<i64>, generation: Option<i64>) -> HealthResult {
    let generation = generation.unwrap_or_default();
    let observed = observed.unwrap_or_default();
    if observed < generation {
        return Err(Unhealthy::new(format!(
            "observed generation outdated ({observed}/{generation})"
        )));
    }
    Ok(())
}

fn require_condition<T: HasConditionFields>(
    conditions: Option<&[T]>,
    type_: &str,
    expected: &str,
) -> HealthResult {
    match get_condition(conditions, type_) {
        None => Err(Unhealthy::new(format!("condition {type_:?} is missing"))),
        Some(c) => check_condition_status(c, expected),
    }
}

fn optional_condition<T: HasConditionFields>(
    conditions: Option<&[T]>,
    type_: &str,
    expected: &str,
) -> HealthResult {
    match get_condition(conditions, type_) {
        None => Ok(()),
        Some(c) => check_condition_status(c, expected),
    }
}

fn check_condition_status<T: HasConditionFields>(condition: &T, expected: &str) -> HealthResult {
    if condition.status_field() == expected {
        return Ok(());
    }
    Err(Unhealthy::new(format!(
        "condition {:?} has invalid status {} (expected {}) due to {}: {}",
        condition.type_field(),
        condition.status_field(),
        expected,
        condition.reason_field(),
        condition.message_field()
    )))
}

/// Check a deployment
///
/// Requires an up-to-date observed generation, `Available=True`, and, when
/// reported, `Progressing=True` and `ReplicaFailure=False`.
pub fn check_deployment(deployment: &Deployment) -> HealthResult {
    let status = deployment.status.as_ref();
    outdated_generation(
        status.and_then(|s| s.observed_generation),
        deployment.metadata.generation,
    )?;

    let conditions = status.and_then(|s| s.conditions.as_deref());
    require_condition(conditions, CONDITION_AVAILABLE, STATUS_TRUE)?;
    optional_condition(conditions, CONDITION_PROGRESSING, STATUS_TRUE)?;
    optional_condition(conditions, CONDITION_REPLICA_FAILURE, STATUS_FALSE)
}

/// Check a stateful set
///
/// Desired replicas default to 1 when unset.
pub fn check_stateful_set(stateful_set: &StatefulSet) -> HealthResult {
    let status = stateful_set.status.as_ref();
    outdated_generation(
        status.and_then(|s| s.observed_generation),
        stateful_set.metadata.generation,
    )?;

    let desired = stateful_set
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
    if ready < desired {
        return Err(Unhealthy::new(format!(
            "not enough ready replicas ({ready}/{desired})"
        )));
    }
    Ok(())
}

/// Check an etcd cluster
///
/// A reported `lastError` is appended to the message and classified.
pub fn check_etcd(etcd: &Etcd) -> HealthResult {
    let status = etcd.status.as_ref();
    if status.and_then(|s| s.ready) == Some(true) {
        return Ok(());
    }

    match status.and_then(|s| s.last_error.as_deref()) {
        Some(last_error) => Err(
            Unhealthy::new(format!("etcd is not ready yet ({last_error})"))
                .with_codes(extract_error_codes(last_error)),
        ),
        None => Err(Unhealthy::new("etcd is not ready yet")),
    }
}

/// Check a node
///
/// Requires `Ready=True` and none of the pressure conditions. Failures caused
/// by resource exhaustion on the kubelet carry a configuration-problem code.
pub fn check_node(node: &Node) -> HealthResult {
    let conditions = node_conditions(node);
    let result = require_condition(conditions, CONDITION_READY, STATUS_TRUE).and_then(|_| {
        NODE_PRESSURE_CONDITIONS
            .iter()
            .try_for_each(|type_| optional_condition(conditions, type_, STATUS_FALSE))
    });

    result.map_err(|unhealthy| {
        let configuration_problem = conditions.unwrap_or_default().iter().any(|c| {
            CONFIGURATION_PROBLEM.is_match(c.reason_field())
                || CONFIGURATION_PROBLEM.is_match(c.message_field())
        });
        if configuration_problem {
            unhealthy.with_codes(vec![ErrorCode::ConfigurationProblem])
        } else {
            unhealthy
        }
    })
}

/// Compare a kubelet version with the version its worker pool should run
///
/// Only versions sharing major and minor are compared; those must match
/// exactly. A minor mismatch is an in-flight upgrade and not reported here.
pub fn check_kubelet_version(
    node_name: &str,
    kubelet: &KubernetesVersion,
    expected: &KubernetesVersion,
) -> HealthResult {
    if kubelet.same_minor(expected) && kubelet != expected {
        return Err(Unhealthy::new(format!(
            "Node {node_name:?} is running kubelet version {kubelet} but its worker pool requires {expected}"
        )));
    }
    Ok(())
}
