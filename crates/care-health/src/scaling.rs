//! Node and machine scaling reconciliation
//!
//! Tells a node count mismatch caused by an in-flight scale operation apart
//! from one caused by a real problem.

use k8s_openapi::api::core::v1::Node;
use thiserror::Error;

use care_common::crd::{Machine, MachineDeployment, MachinePhase};
use care_common::kube_utils::{
    is_node_unschedulable, name_of, node_annotation, ANNOTATION_NOT_MANAGED_BY_MCM,
};

/// Why the registered nodes do not match the desired machine count
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScalingIssue {
    /// Expected while machines are provisioned or drained
    #[error("{0}")]
    Transient(String),
    /// Inconsistent state that will not resolve by waiting
    #[error("{0}")]
    Failure(String),
}

impl ScalingIssue {
    /// Returns true if the issue is expected to resolve on its own
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The human-readable explanation
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(message) | Self::Failure(message) => message,
        }
    }
}

fn machines_are(count: usize) -> String {
    if count == 1 {
        "1 machine is".to_string()
    } else {
        format!("{count} machines are")
    }
}

/// Sum of replicas of machine deployments that are not being deleted
pub fn desired_machine_count(machine_deployments: &[MachineDeployment]) -> usize {
    machine_deployments
        .iter()
        .filter(|md| md.metadata.deletion_timestamp.is_none())
        .map(|md| usize::try_from(md.spec.replicas).unwrap_or(0))
        .sum()
}

/// Check a cluster with fewer ready nodes than desired machines
pub fn check_nodes_scaling_up(
    machines: &[Machine],
    ready_nodes: usize,
    desired: usize,
) -> Result<(), ScalingIssue> {
    if ready_nodes == desired {
        return Ok(());
    }

    if machines.len() < desired {
        return Err(ScalingIssue::Failure(format!(
            "not enough machine objects created yet ({}/{desired})",
            machines.len()
        )));
    }

    let (mut pending, mut erroneous) = (0usize, 0usize);
    for machine in machines {
        match machine.phase() {
            MachinePhase::Running | MachinePhase::Available => {}
            MachinePhase::Pending | MachinePhase::Empty => pending += 1,
            _ => erroneous += 1,
        }
    }

    if erroneous > 0 {
        return Err(ScalingIssue::Failure(format!(
            "{} erroneous",
            machines_are(erroneous)
        )));
    }

    if pending == 0 {
        return Err(ScalingIssue::Failure(format!(
            "not enough ready worker nodes registered in the cluster ({ready_nodes}/{desired})"
        )));
    }

    Err(ScalingIssue::Transient(format!(
        "{} provisioning and should join the cluster soon",
        machines_are(pending)
    )))
}

/// Check a cluster with more registered nodes than desired machines
///
/// Cordoned nodes must belong to machines that are being deleted. Nodes the
/// machine controller does not manage are ignored.
pub fn check_nodes_scaling_down(
    machines: &[Machine],
    nodes: &[Node],
    registered_nodes: usize,
    desired: usize,
) -> Result<(), ScalingIssue> {
    if registered_nodes == desired {
        return Ok(());
    }

    let mut cordoned = 0usize;
    for node in nodes {
        if node_annotation(node, ANNOTATION_NOT_MANAGED_BY_MCM) == Some("true") {
            continue;
        }
        if !is_node_unschedulable(node) {
            continue;
        }

        let node_name = name_of(&node.metadata);
        let machine = machines
            .iter()
            .find(|m| m.node_name() == Some(node_name))
            .ok_or_else(|| {
                ScalingIssue::Failure(format!(
                    "machine object for cordoned node {node_name:?} not found"
                ))
            })?;
        if machine.metadata.deletion_timestamp.is_none() {
            return Err(ScalingIssue::Failure(format!(
                "cordoned node {node_name:?} found but corresponding machine object does not have a deletion timestamp"
            )));
        }
        cordoned += 1;
    }

    if registered_nodes.saturating_sub(cordoned) > desired {
        return Err(ScalingIssue::Failure(format!(
            "too many worker nodes are registered. Exceeding maximum desired machine count ({registered_nodes}/{desired})"
        )));
    }

    Err(ScalingIssue::Transient(format!(
        "{} waiting to be completely drained from pods before deletion",
        machines_are(cordoned)
    )))
}
