//! Condition debouncer and the checker shared by all health categories
//!
//! A failing check never flips a condition straight to `False` when a grace
//! window is configured for its type: it reports `Progressing` first and
//! only turns `False` once the window expired. A new kind of failure (a
//! different reason) always restarts the window.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use care_common::clock::{elapsed_since, Clock};
use care_common::codes::ErrorCode;
use care_common::config::CareConfig;
use care_common::crd::{Condition, ConditionStatus, LastError, LastOperation, LastOperationState};
use care_common::Error;

use crate::reader::ResourceReader;

/// Evaluates health categories of one managed cluster
///
/// Holds no state between evaluations besides configuration. Previous
/// conditions are passed in and new ones returned.
pub struct HealthChecker {
    pub(crate) reader: Arc<dyn ResourceReader>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: CareConfig,
    thresholds: BTreeMap<String, Duration>,
    last_operation: Option<LastOperation>,
}

impl HealthChecker {
    /// Create a checker
    pub fn new(
        reader: Arc<dyn ResourceReader>,
        clock: Arc<dyn Clock>,
        config: &CareConfig,
        last_operation: Option<LastOperation>,
    ) -> Self {
        Self {
            reader,
            clock,
            thresholds: config.health_checks.thresholds(),
            config: config.clone(),
            last_operation,
        }
    }

    /// The clock used for every timestamp and elapsed-time decision
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Grace window configured for a condition type
    pub fn threshold(&self, condition_type: &str) -> Option<Duration> {
        self.thresholds.get(condition_type).copied()
    }

    fn last_operation_succeeded_within(&self, threshold: Duration) -> bool {
        self.last_operation.as_ref().is_some_and(|op| {
            op.succeeded() && elapsed_since(self.clock(), op.last_update_time) <= threshold
        })
    }

    /// Derive the condition for a failed check
    ///
    /// - `True` becomes `Progressing` with a grace window, else `False`.
    /// - `Progressing` stays while a recently succeeded operation or the
    ///   condition's own transition is within the window, else `False`.
    /// - `False` becomes `Progressing` again when the window restarts, i.e.
    ///   a recent successful operation or a different failure reason.
    pub fn failed_condition(
        &self,
        condition: &Condition,
        reason: &str,
        message: &str,
        codes: Vec<ErrorCode>,
    ) -> Condition {
        let threshold = self.threshold(&condition.type_);

        let status = match (condition.status, threshold) {
            (ConditionStatus::True, Some(_)) => ConditionStatus::Progressing,
            (ConditionStatus::Progressing, Some(threshold)) => {
                if self.last_operation_succeeded_within(threshold)
                    || elapsed_since(self.clock(), condition.last_transition_time) <= threshold
                {
                    ConditionStatus::Progressing
                } else {
                    ConditionStatus::False
                }
            }
            (ConditionStatus::False, Some(threshold)) => {
                if self.last_operation_succeeded_within(threshold) || condition.reason != reason {
                    ConditionStatus::Progressing
                } else {
                    ConditionStatus::False
                }
            }
            _ => ConditionStatus::False,
        };

        debug!(
            condition = %condition.type_,
            from = %condition.status,
            to = %status,
            reason,
            "check failed"
        );
        condition.updated(self.clock(), status, reason, message, codes)
    }

    /// Derive a healthy condition
    pub fn healthy_condition(&self, condition: &Condition, reason: &str, message: &str) -> Condition {
        condition.updated(self.clock(), ConditionStatus::True, reason, message, Vec::new())
    }
}

/// Downgrade `False` conditions to `Progressing` while failures are expected
///
/// Applies when no operation was recorded yet, while a create or delete has
/// not succeeded, or while an operation is processing without errors.
pub fn pardon_conditions(
    clock: &dyn Clock,
    conditions: Vec<Condition>,
    last_operation: Option<&LastOperation>,
    last_errors: &[LastError],
) -> Vec<Condition> {
    let pardon = match last_operation {
        None => true,
        Some(op) => {
            (op.type_.is_unstable() && op.state != LastOperationState::Succeeded)
                || (op.state == LastOperationState::Processing && last_errors.is_empty())
        }
    };
    if !pardon {
        return conditions;
    }

    conditions
        .into_iter()
        .map(|c| {
            if c.has_status(ConditionStatus::False) {
                debug!(condition = %c.type_, "pardoning failed condition");
                c.updated(
                    clock,
                    ConditionStatus::Progressing,
                    c.reason.clone(),
                    c.message.clone(),
                    c.codes.clone(),
                )
            } else {
                c
            }
        })
        .collect()
}

type Step<'a> = Box<dyn FnOnce() -> Result<Option<Condition>, Error> + Send + 'a>;

/// Ordered list of check steps where the first failure wins
///
/// Steps run in insertion order and evaluation stops at the first step
/// returning a condition or an error. The order decides which problem is
/// reported when several exist at once.
#[derive(Default)]
pub struct CheckPipeline<'a> {
    steps: Vec<(&'static str, Step<'a>)>,
}

impl<'a> CheckPipeline<'a> {
    /// Empty pipeline
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a named step
    pub fn step(
        mut self,
        name: &'static str,
        check: impl FnOnce() -> Option<Condition> + Send + 'a,
    ) -> Self {
        self.try_step(name, move || Ok(check()))
    }

    /// Append a named step that may fail
    ///
    /// Later steps do not run once it fails.
    pub fn try_step(
        mut self,
        name: &'static str,
        check: impl FnOnce() -> Result<Option<Condition>, Error> + Send + 'a,
    ) -> Self {
        self.steps.push((name, Box::new(check)));
        self
    }

    /// Names of the steps in evaluation order
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|(name, _)| *name).collect()
    }

    /// Run steps until one reports a condition or fails
    pub fn run(self) -> Result<Option<Condition>, Error> {
        for (name, check) in self.steps {
            if let Some(condition) = check()? {
                debug!(step = name, reason = %condition.reason, "check step reported a problem");
                return Ok(Some(condition));
            }
        }
        Ok(None)
    }
}
