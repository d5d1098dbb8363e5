//! Managed resource checks for the system components category

use std::collections::BTreeSet;

use tracing::instrument;

use care_common::clock::elapsed_since;
use care_common::crd::{
    Condition, ConditionStatus, ManagedCluster, ManagedResource, REASON_APPLY_FAILED,
    RESOURCES_APPLIED, RESOURCES_HEALTHY, RESOURCES_PROGRESSING,
};
use care_common::kube_utils::name_of;
use care_common::Error;

use crate::checker::HealthChecker;

/// Reason when the resource manager has not processed the latest spec
pub const REASON_OUTDATED_STATUS: &str = "OutdatedStatus";
/// Reason when a managed resource lacks one of its sub-conditions
pub const REASON_MISSING_CONDITION: &str = "MissingManagedResourceCondition";

/// Sub-conditions every managed resource must report, in check order
const REQUIRED_CONDITIONS: [&str; 3] = [RESOURCES_APPLIED, RESOURCES_HEALTHY, RESOURCES_PROGRESSING];

fn qualified_name(mr: &ManagedResource) -> String {
    format!(
        "{}/{}",
        mr.metadata.namespace.as_deref().unwrap_or_default(),
        name_of(&mr.metadata)
    )
}

impl HealthChecker {
    /// Check one managed resource
    ///
    /// A stale status is reported first, preferring an apply failure over
    /// the generic outdated message. Then `ResourcesApplied` and
    /// `ResourcesHealthy` must be `True` and `ResourcesProgressing` must be
    /// `False`, unless it turned `True` within the configured threshold.
    pub fn check_managed_resource(
        &self,
        condition: &Condition,
        mr: &ManagedResource,
    ) -> Option<Condition> {
        let generation = mr.metadata.generation.unwrap_or_default();
        let observed = mr.status.as_ref().map(|s| s.observed_generation).unwrap_or_default();

        if generation != observed {
            if let Some(applied) = mr
                .condition(RESOURCES_APPLIED)
                .filter(|c| c.status == ConditionStatus::False && c.reason == REASON_APPLY_FAILED)
            {
                return Some(self.failed_condition(
                    condition,
                    &applied.reason,
                    &applied.message,
                    applied.codes.clone(),
                ));
            }
            return Some(self.failed_condition(
                condition,
                REASON_OUTDATED_STATUS,
                &format!(
                    "observed generation of managed resource '{}' outdated ({observed}/{generation})",
                    qualified_name(mr)
                ),
                Vec::new(),
            ));
        }

        let mut found = BTreeSet::new();
        for type_ in REQUIRED_CONDITIONS {
            let Some(sub) = mr.condition(type_) else {
                continue;
            };
            found.insert(type_);
            if let Some(exit) = self.check_managed_resource_condition(condition, sub) {
                return Some(exit);
            }
        }

        let missing: Vec<&str> = REQUIRED_CONDITIONS
            .into_iter()
            .filter(|type_| !found.contains(type_))
            .collect();
        if missing.is_empty() {
            return None;
        }
        Some(self.failed_condition(
            condition,
            REASON_MISSING_CONDITION,
            &format!(
                "ManagedResource {} is missing the following condition(s), [{}]",
                name_of(&mr.metadata),
                missing.join(" ")
            ),
            Vec::new(),
        ))
    }

    fn check_managed_resource_condition(
        &self,
        condition: &Condition,
        sub: &Condition,
    ) -> Option<Condition> {
        let healthy = if sub.type_ == RESOURCES_PROGRESSING {
            sub.status == ConditionStatus::False
                || self
                    .config
                    .health_checks
                    .managed_resource_progressing_threshold
                    .is_some_and(|threshold| {
                        elapsed_since(self.clock(), sub.last_transition_time) <= threshold
                    })
        } else {
            sub.status == ConditionStatus::True
        };

        if healthy {
            return None;
        }
        Some(self.failed_condition(condition, &sub.reason, &sub.message, sub.codes.clone()))
    }

    /// Check every managed resource that deploys into the managed cluster
    #[instrument(skip_all, fields(cluster = %cluster.name))]
    pub async fn check_system_components(
        &self,
        cluster: &ManagedCluster,
        condition: &Condition,
    ) -> Result<Option<Condition>, Error> {
        let managed_resources = self
            .reader
            .list_managed_resources(&cluster.control_plane_namespace)
            .await?;

        Ok(managed_resources
            .iter()
            .filter(|mr| mr.targets_managed_cluster())
            .find_map(|mr| self.check_managed_resource(condition, mr)))
    }
}
