//! Placeholder type inference.
//!
//! [`infer`] does not look at the text beyond checking that there is some.
//! Every non-empty input gets the same classification. [`confirm`] checks a
//! user's correction and then discards it.

use thiserror::Error;

use crate::models::{TypeConfirmation, TypeInference};

pub const PLACEHOLDER_TYPE: &str = "action";
pub const PLACEHOLDER_CONFIDENCE: f64 = 50.0;

/// Classifications the frontend offers.
pub const KNOWN_TYPES: [&str; 3] = ["note", "action", "reminder"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("text must not be empty")]
    EmptyInput,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("confidence {0} is outside 0..=100")]
    ConfidenceOutOfRange(f64),
}

pub fn infer(text: &str) -> Result<TypeInference, InferenceError> {
    if text.trim().is_empty() {
        return Err(InferenceError::EmptyInput);
    }

    Ok(TypeInference {
        inferred_type: PLACEHOLDER_TYPE.to_string(),
        confidence: PLACEHOLDER_CONFIDENCE,
    })
}

pub fn confidence_in_range(confidence: f64) -> bool {
    (0.0..=100.0).contains(&confidence)
}

/// Accept a user's correction. Nothing is stored.
pub fn confirm(confirmation: &TypeConfirmation) -> Result<(), InferenceError> {
    require_text("text", confirmation.text.as_deref())?;
    require_text("inferredType", confirmation.inferred_type.as_deref())?;
    require_text("confirmedType", confirmation.confirmed_type.as_deref())?;

    let confidence = confirmation
        .inferred_confidence
        .ok_or(InferenceError::MissingField("inferredConfidence"))?;
    if !confidence_in_range(confidence) {
        return Err(InferenceError::ConfidenceOutOfRange(confidence));
    }

    tracing::debug!(
        inferred = confirmation.inferred_type.as_deref(),
        confirmed = confirmation.confirmed_type.as_deref(),
        "Type confirmation received"
    );
    Ok(())
}

fn require_text(field: &'static str, value: Option<&str>) -> Result<(), InferenceError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(InferenceError::MissingField(field)),
    }
}
