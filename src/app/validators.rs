//! Field rules shared by several request types.
//!
//! Each rule is generic over any request exposing the field it checks, so a
//! single rule instance can be registered for every request that carries
//! that field.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::inference::confidence_in_range;
use crate::mediator::{ensure_active, Cancelled, Request, ValidationFailure, Validator};

pub trait HasId {
    fn target_id(&self) -> &str;
}

pub trait HasText {
    fn text(&self) -> &str;
}

pub trait HasName {
    fn name(&self) -> &str;
}

pub trait HasConfidence {
    /// The field name reported on failure and the value, when supplied.
    fn confidence(&self) -> (&'static str, Option<f64>);
}

fn required(field: &str, value: &str) -> Vec<ValidationFailure> {
    if value.trim().is_empty() {
        vec![ValidationFailure::new(field, format!("{field} is required"))]
    } else {
        Vec::new()
    }
}

/// `Id` must be non-blank.
pub struct IdRequired;

#[async_trait]
impl<R: Request + HasId> Validator<R> for IdRequired {
    async fn validate(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>, Cancelled> {
        ensure_active(cancel)?;
        Ok(required("Id", request.target_id()))
    }
}

/// `Text` must be non-blank.
pub struct TextRequired;

#[async_trait]
impl<R: Request + HasText> Validator<R> for TextRequired {
    async fn validate(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>, Cancelled> {
        ensure_active(cancel)?;
        Ok(required("Text", request.text()))
    }
}

/// `Name` must be non-blank.
pub struct NameRequired;

#[async_trait]
impl<R: Request + HasName> Validator<R> for NameRequired {
    async fn validate(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>, Cancelled> {
        ensure_active(cancel)?;
        Ok(required("Name", request.name()))
    }
}

/// A supplied confidence must lie within `0..=100`. Absent is fine.
pub struct ConfidenceInRange;

#[async_trait]
impl<R: Request + HasConfidence> Validator<R> for ConfidenceInRange {
    async fn validate(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>, Cancelled> {
        ensure_active(cancel)?;
        match request.confidence() {
            (field, Some(value)) if !confidence_in_range(value) => Ok(vec![
                ValidationFailure::new(field, format!("{field} must be between 0 and 100")),
            ]),
            _ => Ok(Vec::new()),
        }
    }
}
