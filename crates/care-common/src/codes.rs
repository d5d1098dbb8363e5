//! Error code classification
//!
//! Provider errors arrive as free-form text (etcd `lastError`, extension
//! reports). They are mapped onto a small catalogue of codes so operators
//! can tell "your credentials are wrong" apart from "the cloud is out of
//! capacity" without reading the message.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Classified error code attached to a condition
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Provider credentials were rejected
    #[serde(rename = "ERR_INFRA_UNAUTHENTICATED")]
    InfraUnauthenticated,
    /// Provider credentials lack permissions
    #[serde(rename = "ERR_INFRA_UNAUTHORIZED")]
    InfraUnauthorized,
    /// A provider quota is exhausted
    #[serde(rename = "ERR_INFRA_QUOTA_EXCEEDED")]
    InfraQuotaExceeded,
    /// The provider is throttling requests
    #[serde(rename = "ERR_INFRA_RATE_LIMITS_EXCEEDED")]
    InfraRateLimitsExceeded,
    /// A provider-side dependency blocks the operation
    #[serde(rename = "ERR_INFRA_DEPENDENCIES")]
    InfraDependencies,
    /// A provider-side dependency blocks the operation but may clear up
    #[serde(rename = "ERR_RETRYABLE_INFRA_DEPENDENCIES")]
    RetryableInfraDependencies,
    /// The provider has no capacity left for the requested resources
    #[serde(rename = "ERR_INFRA_RESOURCES_DEPLETED")]
    InfraResourcesDepleted,
    /// The cluster configuration itself is broken
    #[serde(rename = "ERR_CONFIGURATION_PROBLEM")]
    ConfigurationProblem,
    /// The cluster configuration is broken in a way that may resolve itself
    #[serde(rename = "ERR_RETRYABLE_CONFIGURATION_PROBLEM")]
    RetryableConfigurationProblem,
    /// An admission webhook may block the cluster from recovering
    #[serde(rename = "ERR_PROBLEMATIC_WEBHOOK")]
    ProblematicWebhook,
}

impl ErrorCode {
    /// Wire representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InfraUnauthenticated => "ERR_INFRA_UNAUTHENTICATED",
            Self::InfraUnauthorized => "ERR_INFRA_UNAUTHORIZED",
            Self::InfraQuotaExceeded => "ERR_INFRA_QUOTA_EXCEEDED",
            Self::InfraRateLimitsExceeded => "ERR_INFRA_RATE_LIMITS_EXCEEDED",
            Self::InfraDependencies => "ERR_INFRA_DEPENDENCIES",
            Self::RetryableInfraDependencies => "ERR_RETRYABLE_INFRA_DEPENDENCIES",
            Self::InfraResourcesDepleted => "ERR_INFRA_RESOURCES_DEPLETED",
            Self::ConfigurationProblem => "ERR_CONFIGURATION_PROBLEM",
            Self::RetryableConfigurationProblem => "ERR_RETRYABLE_CONFIGURATION_PROBLEM",
            Self::ProblematicWebhook => "ERR_PROBLEMATIC_WEBHOOK",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("error code patterns are static and valid")
}

static UNAUTHENTICATED: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(InvalidAuthenticationTokenTenant|Authentication failed|AuthFailure|invalid_client|InvalidAccessKeyId|cannot fetch token|InvalidSecretAccessKey|InvalidSubscriptionId|unauthenticated)",
    )
});
static UNAUTHORIZED: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(Unauthorized|InvalidClientTokenId|SignatureDoesNotMatch|AuthorizationFailed|invalid_grant|not authorized|AccessDenied|OperationNotAllowed|Error 403|SERVICE_ACCOUNT_ACCESS_DENIED)",
    )
});
static QUOTA_EXCEEDED: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(Quotas|Quota.*exceeded|exceeded quota|Quota has been met|QUOTA_EXCEEDED|QuotaExceeded|VcpuLimitExceeded|InstanceLimitExceeded|VolumeLimitExceeded|AddressLimitExceeded|VPCLimitExceeded|SecurityGroupLimitExceeded)",
    )
});
static RATE_LIMITS_EXCEEDED: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)(RequestLimitExceeded|Throttling|Too many requests|rate limit exceeded)"));
static RESOURCES_DEPLETED: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(not available in the current hardware cluster|InsufficientInstanceCapacity|SkuNotAvailable|ZonalAllocationFailed|out of stock)",
    )
});
static DEPENDENCIES: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(PendingVerification|Access Not Configured|accessNotConfigured|DependencyViolation|OptInRequired|inactive billing state|timeout while waiting for state to become|InvalidCidrBlock|already busy for|InvalidParameterValue)",
    )
});
static RETRYABLE_DEPENDENCIES: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)(RetryableError|temporarily unavailable)"));
static CONFIGURATION_PROBLEM: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(AzureBastionSubnet|not supported in your requested Availability Zone|InvalidParameterCombination|InvalidConfiguration|NetcfgInvalidSubnet|violates PodSecurity)",
    )
});
static RETRYABLE_CONFIGURATION_PROBLEM: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(is misconfigured and requires zero voluntary evictions|SDK\.CanNotResolveEndpoint|The requested configuration is currently not supported)",
    )
});

/// Classify free-form error text into error codes
///
/// Returns every matching code in catalogue order; unclassifiable text
/// yields an empty list.
pub fn extract_error_codes(text: &str) -> Vec<ErrorCode> {
    let catalogue: [(&LazyLock<Regex>, ErrorCode); 9] = [
        (&UNAUTHENTICATED, ErrorCode::InfraUnauthenticated),
        (&UNAUTHORIZED, ErrorCode::InfraUnauthorized),
        (&QUOTA_EXCEEDED, ErrorCode::InfraQuotaExceeded),
        (&RATE_LIMITS_EXCEEDED, ErrorCode::InfraRateLimitsExceeded),
        (&RESOURCES_DEPLETED, ErrorCode::InfraResourcesDepleted),
        (&DEPENDENCIES, ErrorCode::InfraDependencies),
        (&RETRYABLE_DEPENDENCIES, ErrorCode::RetryableInfraDependencies),
        (&CONFIGURATION_PROBLEM, ErrorCode::ConfigurationProblem),
        (
            &RETRYABLE_CONFIGURATION_PROBLEM,
            ErrorCode::RetryableConfigurationProblem,
        ),
    ];

    catalogue
        .into_iter()
        .filter(|(re, _)| re.is_match(text))
        .map(|(_, code)| code)
        .collect()
}
