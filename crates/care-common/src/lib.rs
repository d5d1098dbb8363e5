//! Common types for the cluster care engine: conditions, external resources,
//! errors, clock and configuration

#![deny(missing_docs)]

pub mod clock;
pub mod codes;
pub mod config;
pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod telemetry;
pub mod version;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label key carrying the role of a control-plane component
pub const ROLE_LABEL_KEY: &str = "gardener.cloud/role";

/// Label selector for control-plane components
pub const CONTROL_PLANE_SELECTOR: &str = "gardener.cloud/role=controlplane";

/// Label selector for monitoring components
pub const MONITORING_SELECTOR: &str = "gardener.cloud/role=monitoring";

/// Label selector for logging components
pub const LOGGING_SELECTOR: &str = "gardener.cloud/role=logging";

/// Label on nodes naming their worker pool
pub const WORKER_POOL_LABEL: &str = "worker.gardener.cloud/pool";

/// Namespace of system components inside the managed cluster
pub const KUBE_SYSTEM_NAMESPACE: &str = "kube-system";
