//! Engine configuration
//!
//! Loaded once from YAML at startup. Durations and thresholds are validated
//! while deserializing, so a malformed value fails at load time instead of
//! during a health evaluation.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

use crate::Error;

/// Default staleness threshold for extension heartbeats
pub const DEFAULT_STALE_EXTENSION_THRESHOLD: Duration = Duration::from_secs(300);

/// Complete engine configuration
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CareConfig {
    /// Thresholds for the condition debouncer
    #[serde(default)]
    pub health_checks: HealthCheckConfig,
    /// Which observability components are deployed
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Feature gates influencing required components
    #[serde(default)]
    pub feature_gates: FeatureGates,
}

impl CareConfig {
    /// Parse configuration from a YAML document
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml(input: &str) -> Result<Self, Error> {
        let documents = YamlLoader::load_from_str(input).map_err(config_error)?;
        let Some(document) = documents.into_iter().next() else {
            return Ok(Self::default());
        };
        match to_json(document)? {
            Value::Null => Ok(Self::default()),
            value => serde_json::from_value(value).map_err(config_error),
        }
    }
}

fn config_error(e: impl std::fmt::Display) -> Error {
    Error::serialization_for_kind("CareConfig", e.to_string())
}

/// Convert a YAML node so serde can type it through `serde_json`
fn to_json(node: Yaml) -> Result<Value, Error> {
    let value = match node {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::from(i),
        Yaml::Real(text) => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| config_error("malformed floating point number"))?,
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => Value::Array(
            items
                .into_iter()
                .map(to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Hash(entries) => {
            let mut object = Map::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Boolean(b) => b.to_string(),
                    other => return Err(config_error(format!("unsupported key {other:?}"))),
                };
                object.insert(key, to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Alias(_) | Yaml::BadValue => {
            return Err(config_error("aliases and malformed values are not supported"))
        }
    };
    Ok(value)
}

/// Thresholds for the condition debouncer
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    /// Grace windows per condition type
    #[serde(default)]
    pub condition_thresholds: Vec<ConditionThreshold>,
    /// Staleness detection for extension health reports
    #[serde(default)]
    pub stale_extension_health_checks: Option<StaleExtensionHealthChecks>,
    /// How long a managed resource may report `Progressing=True`
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub managed_resource_progressing_threshold: Option<Duration>,
}

impl HealthCheckConfig {
    /// Grace windows keyed by condition type
    pub fn thresholds(&self) -> BTreeMap<String, Duration> {
        self.condition_thresholds
            .iter()
            .map(|t| (t.type_.clone(), t.duration))
            .collect()
    }

    /// Heartbeat staleness threshold, if stale-report detection is enabled
    pub fn stale_extension_threshold(&self) -> Option<Duration> {
        self.stale_extension_health_checks
            .as_ref()
            .filter(|s| s.enabled)
            .map(|s| s.threshold.unwrap_or(DEFAULT_STALE_EXTENSION_THRESHOLD))
    }
}

/// Grace window for one condition type
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ConditionThreshold {
    /// Condition type the window applies to
    #[serde(rename = "type")]
    pub type_: String,
    /// Length of the window
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
}

/// Staleness detection for extension health reports
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StaleExtensionHealthChecks {
    /// Whether stale reports are detected at all
    #[serde(default)]
    pub enabled: bool,
    /// Age after which a heartbeat counts as stale
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub threshold: Option<Duration>,
}

/// Which observability components are deployed for a cluster
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Monitoring stack deployed
    #[serde(default = "default_true")]
    pub monitoring_enabled: bool,
    /// Alertmanager deployed alongside monitoring
    #[serde(default)]
    pub alertmanager_enabled: bool,
    /// Log aggregation (vali) deployed
    #[serde(default = "default_true")]
    pub vali_enabled: bool,
    /// Event logger deployed
    #[serde(default)]
    pub event_logging_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            alertmanager_enabled: false,
            vali_enabled: true,
            event_logging_enabled: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Feature gates influencing the required component set
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureGates {
    /// The machine controller manager runs in the control-plane namespace
    #[serde(default)]
    pub machine_controller_manager_deployment: bool,
}

/// Parse a human-friendly duration string.
///
/// Supports `Nh` (hours), `Nm` (minutes), and `Ns` (seconds); a bare number
/// is read as seconds. Examples: "1h", "30m", "90s", "90".
pub fn parse_duration(s: &str) -> Result<Duration, Error> {
    let s = s.trim();
    let invalid = || Error::validation(format!("invalid duration '{s}', expected e.g. 1h, 30m, 90s"));
    let (number, unit) = if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else if let Some(minutes) = s.strip_suffix('m') {
        (minutes, 60)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else {
        (s, 1)
    };
    let secs = number
        .parse::<u64>()
        .map_err(|_| invalid())?
        .checked_mul(unit)
        .ok_or_else(invalid)?;
    Ok(Duration::from_secs(secs))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    fn into_duration(self) -> Result<Duration, Error> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Self::Text(text) => parse_duration(&text),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    DurationValue::deserialize(deserializer)?
        .into_duration()
        .map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DurationValue>::deserialize(deserializer)?
        .map(DurationValue::into_duration)
        .transpose()
        .map_err(serde::de::Error::custom)
}
