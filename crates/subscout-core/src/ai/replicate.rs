//! Replicate-style prediction API backend
//!
//! Jobs are created with `POST {host}/v1/models/{model}/predictions` and
//! polled with `GET {host}/v1/predictions/{id}`. Streaming models return
//! `output` as an array of text chunks, which are concatenated.
//!
//! # Configuration
//!
//! Environment variables:
//! - `REPLICATE_API_TOKEN`: API token (required)
//! - `REPLICATE_MODEL`: Model slug (default: meta/meta-llama-3-8b-instruct)
//! - `REPLICATE_HOST`: API base URL (default: https://api.replicate.com)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

use super::types::{JobStatus, PredictionRequest};
use super::InferenceBackend;

pub const DEFAULT_HOST: &str = "https://api.replicate.com";
pub const DEFAULT_MODEL: &str = "meta/meta-llama-3-8b-instruct";

/// HTTP client for an asynchronous prediction service
#[derive(Clone)]
pub struct ReplicateBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_token: String,
}

impl std::fmt::Debug for ReplicateBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicateBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ReplicateBackend {
    pub fn new(base_url: &str, model: &str, api_token: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_token: api_token.to_string(),
        }
    }

    /// Create from environment variables; None when no token is set
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("REPLICATE_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())?;
        let host = std::env::var("REPLICATE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let model = std::env::var("REPLICATE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(&host, &model, &token))
    }
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    input: &'a PredictionRequest,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
}

/// Output arrives either as one string or as a list of streamed chunks
fn output_text(output: &Value) -> Option<String> {
    match output {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(parts.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

fn error_text(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Inference(format!(
        "{} returned {}: {}",
        what,
        status,
        body.chars().take(200).collect::<String>()
    )))
}

#[async_trait]
impl InferenceBackend for ReplicateBackend {
    async fn submit(&self, request: &PredictionRequest) -> Result<String> {
        let response = self
            .http_client
            .post(format!(
                "{}/v1/models/{}/predictions",
                self.base_url, self.model
            ))
            .bearer_auth(&self.api_token)
            .json(&SubmitBody { input: request })
            .send()
            .await?;

        let prediction: Prediction = check_status(response, "Prediction submit")
            .await?
            .json()
            .await?;
        debug!(job_id = %prediction.id, status = %prediction.status, "Prediction submitted");
        Ok(prediction.id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus> {
        let response = self
            .http_client
            .get(format!("{}/v1/predictions/{}", self.base_url, job_id))
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let prediction: Prediction = check_status(response, "Prediction poll")
            .await?
            .json()
            .await?;
        Ok(JobStatus::from_parts(
            &prediction.status,
            output_text(&prediction.output),
            error_text(&prediction.error),
        ))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
