//! API server availability

use tracing::{instrument, warn};

use care_common::crd::Condition;

use crate::checker::HealthChecker;
use crate::reader::HEALTHZ_PATH;

/// Reason when `/healthz` answered 200
pub const REASON_HEALTHZ_SUCCEEDED: &str = "HealthzRequestSucceeded";
/// Reason when `/healthz` failed or answered anything but 200
pub const REASON_HEALTHZ_FAILED: &str = "HealthzRequestFailed";

impl HealthChecker {
    /// Probe the managed cluster's API server
    ///
    /// Never errors: a failed request is itself the evidence.
    #[instrument(skip_all)]
    pub async fn check_api_server_availability(&self, condition: &Condition) -> Condition {
        match self.reader.api_server_healthz().await {
            Ok(200) => self.healthy_condition(
                condition,
                REASON_HEALTHZ_SUCCEEDED,
                "API server /healthz endpoint responded with success status code.",
            ),
            Ok(status) => self.failed_condition(
                condition,
                REASON_HEALTHZ_FAILED,
                &format!("API server {HEALTHZ_PATH} endpoint check returned a non-OK status code {status}."),
                Vec::new(),
            ),
            Err(e) => {
                warn!(error = %e, "API server healthz request failed");
                self.failed_condition(
                    condition,
                    REASON_HEALTHZ_FAILED,
                    &format!("Request to API server {HEALTHZ_PATH} endpoint failed: {e}"),
                    Vec::new(),
                )
            }
        }
    }
}
