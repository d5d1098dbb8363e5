//! Hibernation stories
//!
//! A cluster can only be woken up again if no admission webhook blocks the
//! pods and nodes it needs to come back. `HibernationPossible` warns about
//! such webhooks before the operator hibernates.

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ValidatingWebhook,
    ValidatingWebhookConfiguration,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use care_common::codes::ErrorCode;
use care_common::config::CareConfig;
use care_common::crd::{ConditionStatus, HIBERNATION_POSSIBLE};
use care_health::is_problematic_webhook;

use crate::helpers::*;

fn pod_create_rule() -> RuleWithOperations {
    RuleWithOperations {
        api_groups: Some(vec![String::new()]),
        api_versions: Some(vec!["v1".to_string()]),
        operations: Some(vec!["CREATE".to_string()]),
        resources: Some(vec!["pods".to_string()]),
        scope: None,
    }
}

fn configuration_meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

#[test]
fn pod_webhook_without_policy_or_timeout_is_problematic() {
    assert!(is_problematic_webhook(None, None, None, &[pod_create_rule()], None));
    assert!(is_problematic_webhook(
        Some("Fail"),
        None,
        None,
        &[pod_create_rule()],
        None
    ));
    assert!(!is_problematic_webhook(
        Some("Ignore"),
        None,
        None,
        &[pod_create_rule()],
        Some(15)
    ));
}

/// Story: a policy engine installed a fail-closed webhook on pods; the
/// operator is warned before hibernating
#[tokio::test]
async fn story_policy_engine_blocks_hibernation() {
    let clock = test_clock();
    let mut state = healthy_state(1, &clock);
    state.mutating_webhooks = vec![MutatingWebhookConfiguration {
        metadata: configuration_meta("policy-engine"),
        webhooks: Some(vec![MutatingWebhook {
            name: "mutate.policy-engine.io".to_string(),
            failure_policy: Some("Fail".to_string()),
            rules: Some(vec![pod_create_rule()]),
            timeout_seconds: Some(30),
            ..Default::default()
        }]),
    }];

    let constraints = health(state, &clock, CareConfig::default())
        .check_constraints(&cluster(1), &[])
        .await;
    assert_eq!(constraints.len(), 1);
    let hibernation = &constraints[0];
    assert_eq!(hibernation.type_, HIBERNATION_POSSIBLE);
    assert_eq!(hibernation.status, ConditionStatus::False);
    assert_eq!(hibernation.reason, "ProblematicWebhooks");
    assert_eq!(hibernation.codes, vec![ErrorCode::ProblematicWebhook]);
    assert!(hibernation
        .message
        .starts_with("MutatingWebhookConfiguration \"policy-engine\" is problematic"));
}

/// Story: the same webhook, reconfigured to fail open with a short
/// timeout, no longer blocks hibernation
#[tokio::test]
async fn story_fail_open_webhook_is_harmless() {
    let clock = test_clock();
    let mut state = healthy_state(1, &clock);
    state.validating_webhooks = vec![ValidatingWebhookConfiguration {
        metadata: configuration_meta("policy-engine"),
        webhooks: Some(vec![ValidatingWebhook {
            name: "validate.policy-engine.io".to_string(),
            failure_policy: Some("Ignore".to_string()),
            rules: Some(vec![pod_create_rule()]),
            timeout_seconds: Some(5),
            ..Default::default()
        }]),
    }];

    let constraints = health(state, &clock, CareConfig::default())
        .check_constraints(&cluster(1), &[])
        .await;
    assert_eq!(constraints[0].status, ConditionStatus::True);
    assert_eq!(constraints[0].reason, "NoProblematicWebhooks");
}

/// Story: a hibernated cluster has no running control plane; its health
/// is not checked and reported as not checked
#[tokio::test]
async fn story_hibernated_cluster_is_not_checked() {
    let clock = test_clock();
    let mut c = cluster(1);
    c.is_hibernated = true;

    let conditions = health(ClusterState::default(), &clock, CareConfig::default())
        .check(&c, &[], &[])
        .await;
    assert_eq!(conditions.len(), 5);
    for condition in &conditions {
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason, "ConditionNotChecked");
        assert_eq!(condition.message, "Shoot cluster has been hibernated.");
    }
}
