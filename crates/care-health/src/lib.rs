//! Health and condition evaluation for managed clusters
//!
//! Inspects a managed cluster's control plane, observability stack, system
//! components, worker nodes and admission webhooks, and derives its health
//! conditions and constraints from the previous ones.
//!
//! Related crates:
//! - `care-common`: conditions, external resource types, clock and configuration

#![deny(missing_docs)]

pub mod apiserver;
pub mod checker;
pub mod control_plane;
pub mod extension;
pub mod health;
pub mod managed_resource;
pub mod nodes;
pub mod predicates;
pub mod reader;
pub mod required;
pub mod scaling;
pub mod webhook;

#[cfg(test)]
mod fixtures;

pub use checker::{pardon_conditions, CheckPipeline, HealthChecker};
pub use health::Health;
pub use reader::{ResourceReader, ResourceReaderImpl};
pub use scaling::{check_nodes_scaling_down, check_nodes_scaling_up, ScalingIssue};
pub use webhook::is_problematic_webhook;

// Re-export common error types
pub use care_common::{Error, Result};
