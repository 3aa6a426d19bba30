use serde::{Deserialize, Serialize};

use crate::db::Entity;

/// A captured thought.
///
/// `id` and `created_at` are assigned once when the capture is created and
/// never change. Updates only touch `text` and the classification fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub id: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// One of `note`, `action`, `reminder` when classified.
    pub inferred_type: Option<String>,
    /// Confidence of `inferred_type`, within `0..=100`.
    pub type_confidence: Option<f64>,
}

impl Capture {
    /// Build a new capture with a generated id and the current timestamp.
    pub fn new(input: CreateCaptureInput) -> Self {
        Self {
            id: super::new_id(),
            text: input.text,
            created_at: super::now_millis(),
            inferred_type: input.inferred_type,
            type_confidence: input.type_confidence,
        }
    }
}

impl Entity for Capture {
    type Changes = UpdateCaptureInput;

    const KIND: &'static str = "capture";

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, changes: UpdateCaptureInput) {
        self.text = changes.text;
        if let Some(inferred_type) = changes.inferred_type {
            self.inferred_type = Some(inferred_type);
        }
        if let Some(confidence) = changes.type_confidence {
            self.type_confidence = Some(confidence);
        }
    }
}

/// Input for creating a capture.
///
/// `text` defaults to empty when missing so the validation stage can report
/// it as a field error instead of the request failing to parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaptureInput {
    #[serde(default)]
    pub text: String,
    pub inferred_type: Option<String>,
    pub type_confidence: Option<f64>,
}

/// Input for updating a capture.
///
/// `text` always replaces the stored text. The classification fields only
/// replace stored values when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCaptureInput {
    #[serde(default)]
    pub text: String,
    pub inferred_type: Option<String>,
    pub type_confidence: Option<f64>,
}
