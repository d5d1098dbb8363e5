//! Detection of admission webhooks that can deadlock a cluster
//!
//! A webhook that fails closed on pods, nodes or core system resources can
//! keep the managed cluster from ever creating the pods its own backing
//! service needs, e.g. when waking up from hibernation. Webhooks are
//! matched rule by rule against a static catalogue of sensitive resources.

use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, RuleWithOperations, ValidatingWebhook,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use tracing::{debug, instrument};

use care_common::codes::ErrorCode;
use care_common::crd::{Condition, ConditionStatus};
use care_common::kube_utils::name_of;
use care_common::Error;

use crate::checker::HealthChecker;

/// Reason when a problematic webhook was found
pub const REASON_PROBLEMATIC_WEBHOOKS: &str = "ProblematicWebhooks";
/// Reason when no problematic webhook was found
pub const REASON_NO_PROBLEMATIC_WEBHOOKS: &str = "NoProblematicWebhooks";

/// Failure policy rejecting requests when the webhook is unreachable
pub const FAILURE_POLICY_FAIL: &str = "Fail";

/// Webhooks bounded by at most this timeout are harmless unless they fail closed
pub const SAFE_TIMEOUT_SECONDS: i32 = 15;
/// Lease webhooks above this timeout stall leader election
pub const LEASE_TIMEOUT_SECONDS: i32 = 3;
/// API server default when a webhook sets no timeout
const DEFAULT_TIMEOUT_SECONDS: i32 = 10;

const WILDCARD: &str = "*";

/// Labels of the system namespace as seen by namespace selectors
const KUBE_SYSTEM_LABELS: &[(&str, &str)] = &[
    ("kubernetes.io/metadata.name", "kube-system"),
    ("gardener.cloud/purpose", "kube-system"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Cluster,
    Namespaced,
}

impl Scope {
    fn as_str(self) -> &'static str {
        match self {
            Self::Cluster => "Cluster",
            Self::Namespaced => "Namespaced",
        }
    }
}

/// A sensitive resource and the labels its objects and namespace carry
#[derive(Debug)]
struct ConstraintMatcher {
    group: &'static str,
    version: &'static str,
    resource: &'static str,
    subresource: Option<&'static str>,
    scope: Scope,
    namespace_labels: Option<&'static [(&'static str, &'static str)]>,
    object_labels: Option<&'static [(&'static str, &'static str)]>,
}

const fn cluster(group: &'static str, version: &'static str, resource: &'static str) -> ConstraintMatcher {
    ConstraintMatcher {
        group,
        version,
        resource,
        subresource: None,
        scope: Scope::Cluster,
        namespace_labels: None,
        object_labels: None,
    }
}

const fn kube_system(
    group: &'static str,
    version: &'static str,
    resource: &'static str,
) -> ConstraintMatcher {
    ConstraintMatcher {
        group,
        version,
        resource,
        subresource: None,
        scope: Scope::Namespaced,
        namespace_labels: Some(KUBE_SYSTEM_LABELS),
        object_labels: None,
    }
}

const fn with_subresource(matcher: ConstraintMatcher, subresource: &'static str) -> ConstraintMatcher {
    ConstraintMatcher {
        subresource: Some(subresource),
        ..matcher
    }
}

const LEASES: ConstraintMatcher = kube_system("coordination.k8s.io", "v1", "leases");

const PODS: ConstraintMatcher = ConstraintMatcher {
    group: "",
    version: "v1",
    resource: "pods",
    subresource: None,
    scope: Scope::Namespaced,
    namespace_labels: None,
    object_labels: None,
};

const CATALOGUE: &[ConstraintMatcher] = &[
    PODS,
    with_subresource(PODS, "status"),
    cluster("", "v1", "nodes"),
    with_subresource(cluster("", "v1", "nodes"), "status"),
    ConstraintMatcher {
        object_labels: Some(KUBE_SYSTEM_LABELS),
        ..cluster("", "v1", "namespaces")
    },
    kube_system("", "v1", "configmaps"),
    kube_system("", "v1", "secrets"),
    kube_system("", "v1", "serviceaccounts"),
    kube_system("", "v1", "services"),
    kube_system("", "v1", "endpoints"),
    kube_system("discovery.k8s.io", "v1", "endpointslices"),
    kube_system("apps", "v1", "deployments"),
    kube_system("apps", "v1", "daemonsets"),
    kube_system("apps", "v1", "replicasets"),
    kube_system("networking.k8s.io", "v1", "networkpolicies"),
    kube_system("policy", "v1", "poddisruptionbudgets"),
    kube_system("rbac.authorization.k8s.io", "v1", "roles"),
    kube_system("rbac.authorization.k8s.io", "v1", "rolebindings"),
    cluster("rbac.authorization.k8s.io", "v1", "clusterroles"),
    cluster("rbac.authorization.k8s.io", "v1", "clusterrolebindings"),
    cluster("apiextensions.k8s.io", "v1", "customresourcedefinitions"),
    cluster("apiregistration.k8s.io", "v1", "apiservices"),
    cluster("certificates.k8s.io", "v1", "certificatesigningrequests"),
    cluster("scheduling.k8s.io", "v1", "priorityclasses"),
    cluster("storage.k8s.io", "v1", "csinodes"),
    cluster("authentication.k8s.io", "v1", "tokenreviews"),
    cluster("authorization.k8s.io", "v1", "subjectaccessreviews"),
];

fn contains_or_wildcard(values: Option<&[String]>, wanted: &str) -> bool {
    values
        .unwrap_or_default()
        .iter()
        .any(|v| v == WILDCARD || v == wanted)
}

impl ConstraintMatcher {
    fn matches_resource(&self, resources: Option<&[String]>) -> bool {
        resources.unwrap_or_default().iter().any(|r| {
            let (resource, sub) = match r.split_once('/') {
                Some((resource, sub)) => (resource, Some(sub)),
                None => (r.as_str(), None),
            };
            let resource_matches = resource == WILDCARD || resource == self.resource;
            let sub_matches = match (sub, self.subresource) {
                (None, None) => true,
                (None, Some(_)) => false,
                (Some(sub), None) => sub == WILDCARD,
                (Some(sub), Some(wanted)) => sub == WILDCARD || sub == wanted,
            };
            resource_matches && sub_matches
        })
    }

    fn matches(
        &self,
        rule: &RuleWithOperations,
        object_selector: Option<&LabelSelector>,
        namespace_selector: Option<&LabelSelector>,
    ) -> bool {
        let scope_matches = rule
            .scope
            .as_deref()
            .is_none_or(|s| s == WILDCARD || s == self.scope.as_str());

        scope_matches
            && contains_or_wildcard(rule.api_groups.as_deref(), self.group)
            && contains_or_wildcard(rule.api_versions.as_deref(), self.version)
            && self.matches_resource(rule.resources.as_deref())
            && self
                .namespace_labels
                .is_none_or(|labels| selector_matches(namespace_selector, labels))
            && self
                .object_labels
                .is_none_or(|labels| selector_matches(object_selector, labels))
    }
}

/// Evaluate a label selector against a fixed label set
///
/// An absent or empty selector selects everything.
fn selector_matches(selector: Option<&LabelSelector>, labels: &[(&str, &str)]) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    let value_of = |key: &str| labels.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);

    let labels_match = selector
        .match_labels
        .iter()
        .flatten()
        .all(|(key, value)| value_of(key.as_str()) == Some(value.as_str()));

    let expressions_match = selector.match_expressions.iter().flatten().all(|req| {
        let value = value_of(req.key.as_str());
        let values = req.values.as_deref().unwrap_or_default();
        match req.operator.as_str() {
            "In" => value.is_some_and(|v| values.iter().any(|x| x == v)),
            "NotIn" => value.is_none_or(|v| !values.iter().any(|x| x == v)),
            "Exists" => value.is_some(),
            "DoesNotExist" => value.is_none(),
            _ => false,
        }
    });

    labels_match && expressions_match
}

/// Returns true if a webhook may block the cluster from recovering
///
/// Lease webhooks in the system namespace are problematic above a tiny
/// timeout whatever their failure policy. Otherwise a webhook that does not
/// fail closed and has a bounded timeout is safe, and everything else is
/// problematic as soon as one rule hits the catalogue.
pub fn is_problematic_webhook(
    failure_policy: Option<&str>,
    object_selector: Option<&LabelSelector>,
    namespace_selector: Option<&LabelSelector>,
    rules: &[RuleWithOperations],
    timeout_seconds: Option<i32>,
) -> bool {
    let blocks_leases = rules
        .iter()
        .any(|rule| LEASES.matches(rule, object_selector, namespace_selector));
    if blocks_leases && timeout_seconds.is_none_or(|t| t > LEASE_TIMEOUT_SECONDS) {
        return true;
    }

    let fails_open = failure_policy.is_some_and(|p| p != FAILURE_POLICY_FAIL);
    if fails_open && timeout_seconds.is_some_and(|t| t <= SAFE_TIMEOUT_SECONDS) {
        return false;
    }

    rules.iter().any(|rule| {
        CATALOGUE
            .iter()
            .any(|matcher| matcher.matches(rule, object_selector, namespace_selector))
    })
}

/// Common view of validating and mutating webhooks
pub trait AdmissionWebhook {
    /// Webhook name
    fn name(&self) -> &str;
    /// Failure policy, if set
    fn failure_policy(&self) -> Option<&str>;
    /// Object selector, if set
    fn object_selector(&self) -> Option<&LabelSelector>;
    /// Namespace selector, if set
    fn namespace_selector(&self) -> Option<&LabelSelector>;
    /// Rules, empty if unset
    fn rules(&self) -> &[RuleWithOperations];
    /// Timeout, if set
    fn timeout_seconds(&self) -> Option<i32>;

    /// Returns true if this webhook may block the cluster from recovering
    fn is_problematic(&self) -> bool {
        is_problematic_webhook(
            self.failure_policy(),
            self.object_selector(),
            self.namespace_selector(),
            self.rules(),
            self.timeout_seconds(),
        )
    }
}

macro_rules! impl_admission_webhook {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl AdmissionWebhook for $ty {
                fn name(&self) -> &str {
                    &self.name
                }
                fn failure_policy(&self) -> Option<&str> {
                    self.failure_policy.as_deref()
                }
                fn object_selector(&self) -> Option<&LabelSelector> {
                    self.object_selector.as_ref()
                }
                fn namespace_selector(&self) -> Option<&LabelSelector> {
                    self.namespace_selector.as_ref()
                }
                fn rules(&self) -> &[RuleWithOperations] {
                    self.rules.as_deref().unwrap_or_default()
                }
                fn timeout_seconds(&self) -> Option<i32> {
                    self.timeout_seconds
                }
            }
        )+
    };
}

impl_admission_webhook!(ValidatingWebhook, MutatingWebhook);

fn problematic_message<W: AdmissionWebhook>(kind: &str, configuration: &str, webhook: &W) -> String {
    format!(
        "{kind} {configuration:?} is problematic: webhook {:?} with failurePolicy {:?} and {}s timeout might prevent worker nodes from properly joining the shoot cluster.",
        webhook.name(),
        webhook.failure_policy().unwrap_or(FAILURE_POLICY_FAIL),
        webhook.timeout_seconds().unwrap_or(DEFAULT_TIMEOUT_SECONDS),
    )
}

impl HealthChecker {
    /// Evaluate the hibernation constraint against the cluster's webhooks
    ///
    /// Validating configurations are inspected before mutating ones; the
    /// first problematic webhook is reported.
    #[instrument(skip_all, fields(constraint = %constraint.type_))]
    pub async fn check_for_problematic_webhooks(
        &self,
        constraint: &Condition,
    ) -> Result<Condition, Error> {
        let validating = self.reader.list_validating_webhook_configurations().await?;
        for configuration in &validating {
            for webhook in configuration.webhooks.iter().flatten() {
                if webhook.is_problematic() {
                    let message = problematic_message(
                        "ValidatingWebhookConfiguration",
                        name_of(&configuration.metadata),
                        webhook,
                    );
                    debug!(webhook = %webhook.name, "problematic validating webhook");
                    return Ok(self.problematic(constraint, message));
                }
            }
        }

        let mutating = self.reader.list_mutating_webhook_configurations().await?;
        for configuration in &mutating {
            for webhook in configuration.webhooks.iter().flatten() {
                if webhook.is_problematic() {
                    let message = problematic_message(
                        "MutatingWebhookConfiguration",
                        name_of(&configuration.metadata),
                        webhook,
                    );
                    debug!(webhook = %webhook.name, "problematic mutating webhook");
                    return Ok(self.problematic(constraint, message));
                }
            }
        }

        Ok(constraint.updated(
            self.clock(),
            ConditionStatus::True,
            REASON_NO_PROBLEMATIC_WEBHOOKS,
            "No problematic webhooks found.",
            Vec::new(),
        ))
    }

    fn problematic(&self, constraint: &Condition, message: String) -> Condition {
        constraint.updated(
            self.clock(),
            ConditionStatus::False,
            REASON_PROBLEMATIC_WEBHOOKS,
            message,
            vec![ErrorCode::ProblematicWebhook],
        )
    }
}
