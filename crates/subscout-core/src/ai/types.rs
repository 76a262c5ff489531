//! Inference request/response types
//!
//! Backend-agnostic: every `InferenceBackend` speaks these.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One asynchronous prediction job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Outcome of polling a job once
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Queued, starting or still processing
    Pending(String),
    /// Finished; carries the model's output text
    Succeeded(String),
    /// Finished unsuccessfully (failed or canceled), with the service's error if any
    Failed(Option<String>),
}

impl JobStatus {
    /// Map a raw status string plus output onto a `JobStatus`.
    ///
    /// Anything other than `succeeded`/`failed`/`canceled` keeps the job pending.
    pub fn from_parts(status: &str, output: Option<String>, error: Option<String>) -> Self {
        match status {
            "succeeded" => Self::Succeeded(output.unwrap_or_default()),
            "failed" | "canceled" => Self::Failed(error),
            other => Self::Pending(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }
}

/// Structured analysis returned by the model.
///
/// Fields are loosely typed on purpose: models return amounts as `"₹499"`,
/// `499` or `"499.00"`, and confidences as `0.9` or `90`. The classifier
/// validates and converts them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiAnalysis {
    #[serde(default)]
    pub amount: Value,
    pub vendor: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub is_subscription: bool,
    pub subscription_type: Option<String>,
    pub billing_cycle: Option<String>,
    pub service_logo: Option<String>,
    #[serde(default)]
    pub is_trial: bool,
    pub trial_reason: Option<String>,
}
