use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::validators::{HasConfidence, HasText};
use crate::inference;
use crate::mediator::{ensure_active, Cancelled, Handler, Request, ValidationFailure, Validator};
use crate::models::{InferTypeInput, TypeConfirmation, TypeInference};

#[derive(Debug, Clone)]
pub struct InferType {
    pub input: InferTypeInput,
}

impl Request for InferType {
    type Response = TypeInference;
}

#[derive(Debug, Clone)]
pub struct ConfirmType {
    pub confirmation: TypeConfirmation,
}

impl Request for ConfirmType {
    type Response = ();
}

impl HasText for InferType {
    fn text(&self) -> &str {
        &self.input.text
    }
}

impl HasConfidence for ConfirmType {
    fn confidence(&self) -> (&'static str, Option<f64>) {
        ("InferredConfidence", self.confirmation.inferred_confidence)
    }
}

/// Every field of a confirmation must be supplied.
pub struct ConfirmationComplete;

#[async_trait]
impl Validator<ConfirmType> for ConfirmationComplete {
    async fn validate(
        &self,
        request: &ConfirmType,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidationFailure>, Cancelled> {
        ensure_active(cancel)?;
        let c = &request.confirmation;
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

        let mut failures = Vec::new();
        if blank(&c.text) {
            failures.push(ValidationFailure::new("Text", "Text is required"));
        }
        if blank(&c.inferred_type) {
            failures.push(ValidationFailure::new("InferredType", "InferredType is required"));
        }
        if c.inferred_confidence.is_none() {
            failures.push(ValidationFailure::new(
                "InferredConfidence",
                "InferredConfidence is required",
            ));
        }
        if blank(&c.confirmed_type) {
            failures.push(ValidationFailure::new("ConfirmedType", "ConfirmedType is required"));
        }
        Ok(failures)
    }
}

pub struct TypeInferenceHandler;

#[async_trait]
impl Handler<InferType> for TypeInferenceHandler {
    async fn handle(&self, request: InferType, _: &CancellationToken) -> anyhow::Result<TypeInference> {
        Ok(inference::infer(&request.input.text)?)
    }
}

#[async_trait]
impl Handler<ConfirmType> for TypeInferenceHandler {
    async fn handle(&self, request: ConfirmType, _: &CancellationToken) -> anyhow::Result<()> {
        Ok(inference::confirm(&request.confirmation)?)
    }
}
