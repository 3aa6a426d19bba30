use serde::{Deserialize, Serialize};

/// The classification suggested for a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInference {
    pub inferred_type: String,
    /// Within `0..=100`.
    pub confidence: f64,
}

/// Input for requesting a classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferTypeInput {
    #[serde(default)]
    pub text: String,
}

/// A user's correction of a suggested classification.
///
/// Every field is optional on the wire so that missing fields are reported by
/// validation rather than rejected while parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeConfirmation {
    pub text: Option<String>,
    pub inferred_type: Option<String>,
    pub inferred_confidence: Option<f64>,
    pub confirmed_type: Option<String>,
}
