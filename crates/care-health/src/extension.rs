//! Health reports of decoupled extension controllers
//!
//! Extensions report conditions of the same types the engine computes.
//! A report is only trusted while its heartbeat is fresh.

use tracing::debug;

use care_common::clock::elapsed_since;
use care_common::crd::{Condition, ConditionStatus, ExtensionCondition};

use crate::checker::HealthChecker;

impl HealthChecker {
    /// Check extension reports matching the condition's type
    ///
    /// Reports are checked in the order given. A stale heartbeat yields
    /// `Unknown` even if the report itself is healthy.
    pub fn check_extension_conditions(
        &self,
        condition: &Condition,
        extension_conditions: &[ExtensionCondition],
    ) -> Option<Condition> {
        let stale_threshold = self.config.health_checks.stale_extension_threshold();

        for ext in extension_conditions
            .iter()
            .filter(|ext| ext.condition.type_ == condition.type_)
        {
            let reported = &ext.condition;
            let source = format!(
                "{} extension ({}/{})",
                ext.extension_type, ext.extension_namespace, ext.extension_name
            );

            if let Some(threshold) = stale_threshold {
                let heartbeat = ext.last_heartbeat_time.unwrap_or(reported.last_update_time);
                let elapsed = elapsed_since(self.clock(), heartbeat);
                if elapsed > threshold {
                    debug!(
                        condition = %condition.type_,
                        extension = %source,
                        elapsed_secs = elapsed.as_secs(),
                        "extension health report is outdated"
                    );
                    return Some(condition.updated(
                        self.clock(),
                        ConditionStatus::Unknown,
                        format!("{}OutdatedHealthCheckReport", ext.extension_type),
                        format!(
                            "{source} reports an outdated health status (last heartbeat {}s ago at {}).",
                            elapsed.as_secs(),
                            heartbeat.to_rfc3339()
                        ),
                        Vec::new(),
                    ));
                }
            }

            match reported.status {
                ConditionStatus::False | ConditionStatus::Unknown => {
                    return Some(self.failed_condition(
                        condition,
                        &format!("{}UnhealthyReport", ext.extension_type),
                        &format!(
                            "{source} reports failing health check: {}",
                            reported.message
                        ),
                        reported.codes.clone(),
                    ));
                }
                ConditionStatus::Progressing => {
                    return Some(condition.updated(
                        self.clock(),
                        ConditionStatus::Progressing,
                        reported.reason.clone(),
                        reported.message.clone(),
                        reported.codes.clone(),
                    ));
                }
                ConditionStatus::True => {}
            }
        }
        None
    }
}
