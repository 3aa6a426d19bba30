use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::{DispatchError, Request};

/// A single problem with one field of a request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Returned by a validator that observed cancellation.
#[derive(Debug, Clone, Copy, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

pub fn ensure_active(cancel: &CancellationToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}

/// Inspects a request and reports zero or more field failures.
#[async_trait]
pub trait Validator<R: Request>: Send + Sync {
    async fn validate(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>, Cancelled>;
}

/// Every distinct (field, message) pair reported for a request.
///
/// Failures are kept sorted and deduplicated, so the result does not depend on
/// the order validators finished in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailed {
    failures: Vec<ValidationFailure>,
}

impl ValidationFailed {
    pub fn new(failures: impl IntoIterator<Item = ValidationFailure>) -> Self {
        let unique: BTreeSet<_> = failures.into_iter().collect();
        Self {
            failures: unique.into_iter().collect(),
        }
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// Messages grouped by field name.
    pub fn errors(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for failure in &self.failures {
            grouped
                .entry(failure.field.clone())
                .or_default()
                .push(failure.message.clone());
        }
        grouped
    }
}

impl fmt::Display for ValidationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed")?;
        for (i, failure) in self.failures.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} {}", failure.field, failure.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailed {}

/// Run every validator against `request` and reject it if any failed.
///
/// Cancellation is checked before any validator starts. If a validator
/// reports cancellation the whole stage is cancelled, even when other
/// validators produced failures.
pub(super) async fn run<R: Request>(
    validators: &[Arc<dyn Validator<R>>],
    request: &R,
    cancel: &CancellationToken,
) -> Result<(), DispatchError> {
    ensure_active(cancel)?;
    if validators.is_empty() {
        return Ok(());
    }

    let outcomes = join_all(validators.iter().map(|v| v.validate(request, cancel))).await;

    let mut failures = Vec::new();
    for outcome in outcomes {
        failures.extend(outcome?);
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailed::new(failures).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_pairs_collapse_and_distinct_messages_stay() {
        let failed = ValidationFailed::new([
            ValidationFailure::new("Text", "Text is required"),
            ValidationFailure::new("Text", "Text is required"),
            ValidationFailure::new("Text", "Text must not be empty"),
        ]);

        let errors = failed.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors["Text"],
            vec!["Text is required", "Text must not be empty"]
        );
    }

    #[test]
    fn grouping_is_independent_of_input_order() {
        let a = ValidationFailure::new("Text", "required");
        let b = ValidationFailure::new("Id", "required");
        let c = ValidationFailure::new("Text", "too long");

        let forward = ValidationFailed::new([a.clone(), b.clone(), c.clone()]);
        let backward = ValidationFailed::new([c, b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward.errors(), backward.errors());
    }

    #[test]
    fn display_lists_each_failure() {
        let failed = ValidationFailed::new([
            ValidationFailure::new("Text", "is required"),
            ValidationFailure::new("Id", "is required"),
        ]);
        assert_eq!(
            failed.to_string(),
            "Validation failed: Id is required; Text is required"
        );
    }
}
