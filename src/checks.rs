// src/checks.rs

//! The conformance log and its `check` / `validate` / `attempt` primitives.
//!
//! Every protocol expectation the harness tests is recorded as a `Check`.
//! The log is append-only and insertion-ordered; checks are never mutated
//! or removed once logged. The primitives produce explicit `Result`
//! outcomes: the log write happens unconditionally at the point an outcome
//! is produced, and the outcome itself is returned to the caller unchanged,
//! so logging never interferes with propagation.

use crate::error::OidcTesterError;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// A single recorded conformance assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub description: String,
    pub pass: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The shared, append-only log of conformance checks.
///
/// Cheap to clone; every component of the harness reports through the same
/// underlying log. Each recorded check is also emitted as a `tracing` event
/// so a run can be followed live.
#[derive(Clone, Default)]
pub struct ConformanceLog {
    checks: Arc<Mutex<Vec<Check>>>,
}

impl ConformanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the result of a conformance check, returning the pass/fail value
    /// unchanged. Never fails.
    pub fn check(&self, condition: bool, description: &str, details: Option<String>) -> bool {
        self.record(Check {
            description: description.to_string(),
            pass: condition,
            details,
        });
        condition
    }

    /// Validate a raw JSON document against a schema validator, logging a
    /// check either way.
    ///
    /// On violation the check carries the violation message as its details
    /// and a `Schema` error is returned so the current operation halts.
    pub fn validate<T>(
        &self,
        value: &Value,
        validator: impl FnOnce(&Value) -> Result<T, String>,
        description: &str,
    ) -> Result<T, OidcTesterError> {
        match validator(value) {
            Ok(parsed) => {
                self.record(Check {
                    description: description.to_string(),
                    pass: true,
                    details: None,
                });
                Ok(parsed)
            }
            Err(message) => {
                self.record(Check {
                    description: description.to_string(),
                    pass: false,
                    details: Some(message.clone()),
                });
                Err(OidcTesterError::Schema(message))
            }
        }
    }

    /// Await an operation, logging a check for its outcome and returning
    /// the outcome unchanged. Failure details are the error's display form.
    ///
    /// `attempt` never swallows an error, it only annotates it.
    pub async fn attempt<T, Fut>(&self, description: &str, op: Fut) -> Result<T, OidcTesterError>
    where
        Fut: Future<Output = Result<T, OidcTesterError>>,
    {
        self.attempt_with(description, |e| e.to_string(), op).await
    }

    /// Like `attempt`, but with a caller-supplied details extractor for the
    /// failure case.
    pub async fn attempt_with<T, Fut, F>(
        &self,
        description: &str,
        details: F,
        op: Fut,
    ) -> Result<T, OidcTesterError>
    where
        Fut: Future<Output = Result<T, OidcTesterError>>,
        F: FnOnce(&OidcTesterError) -> String,
    {
        match op.await {
            Ok(value) => {
                self.record(Check {
                    description: description.to_string(),
                    pass: true,
                    details: None,
                });
                Ok(value)
            }
            Err(err) => {
                self.record(Check {
                    description: description.to_string(),
                    pass: false,
                    details: Some(details(&err)),
                });
                Err(err)
            }
        }
    }

    /// A snapshot of all checks logged so far, in insertion order.
    pub fn checks(&self) -> Vec<Check> {
        self.lock().clone()
    }

    /// Number of failed checks logged so far.
    pub fn failure_count(&self) -> usize {
        self.lock().iter().filter(|c| !c.pass).count()
    }

    fn record(&self, check: Check) {
        if check.pass {
            info!(description = %check.description, "check passed");
        } else {
            warn!(
                description = %check.description,
                details = check.details.as_deref().unwrap_or(""),
                "check FAILED"
            );
        }
        self.lock().push(check);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Check>> {
        // A poisoned log would only lose observability, never correctness.
        self.checks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
