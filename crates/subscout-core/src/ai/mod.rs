//! Pluggable inference backend abstraction
//!
//! The classifier talks to an asynchronous prediction service: a job is
//! submitted, then polled until it reaches a terminal state.
//!
//! # Architecture
//!
//! - `InferenceBackend` trait: submit/poll interface every backend implements
//! - `InferenceClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `ReplicateBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `INFERENCE_BACKEND`: Backend to use (replicate, mock). Default: replicate
//! - `REPLICATE_API_TOKEN`: API token (required for replicate; unset disables AI)
//! - `REPLICATE_MODEL`: Model slug (default: meta/meta-llama-3-8b-instruct)
//! - `REPLICATE_HOST`: API base URL (default: https://api.replicate.com)

pub(crate) mod mock;
pub mod parsing;
mod replicate;
pub mod types;

pub use mock::MockBackend;
pub use replicate::ReplicateBackend;
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;

/// Interface of an asynchronous prediction service
///
/// Backends must be Send + Sync so classifiers can share them across workers.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Create a prediction job and return its identifier
    async fn submit(&self, request: &PredictionRequest) -> Result<String>;

    /// Check a job once
    async fn poll(&self, job_id: &str) -> Result<JobStatus>;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete inference client enum
#[derive(Debug, Clone)]
pub enum InferenceClient {
    /// Replicate-style HTTP prediction API
    Replicate(ReplicateBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl InferenceClient {
    /// Create an inference client from environment variables
    ///
    /// Checks `INFERENCE_BACKEND` to determine which backend to use:
    /// - `replicate` (default): Uses REPLICATE_API_TOKEN, REPLICATE_MODEL, REPLICATE_HOST
    /// - `mock`: Creates a mock backend for testing
    ///
    /// Returns None if the required environment variables are not set, in
    /// which case classification runs on the heuristic path only.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("INFERENCE_BACKEND").unwrap_or_else(|_| "replicate".to_string());

        match backend.to_lowercase().as_str() {
            "replicate" => ReplicateBackend::from_env().map(InferenceClient::Replicate),
            "mock" => Some(InferenceClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown INFERENCE_BACKEND, falling back to replicate");
                ReplicateBackend::from_env().map(InferenceClient::Replicate)
            }
        }
    }

    /// Create a Replicate backend directly
    pub fn replicate(host: &str, model: &str, api_token: &str) -> Self {
        InferenceClient::Replicate(ReplicateBackend::new(host, model, api_token))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        InferenceClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl InferenceBackend for InferenceClient {
    async fn submit(&self, request: &PredictionRequest) -> Result<String> {
        match self {
            InferenceClient::Replicate(b) => b.submit(request).await,
            InferenceClient::Mock(b) => b.submit(request).await,
        }
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus> {
        match self {
            InferenceClient::Replicate(b) => b.poll(job_id).await,
            InferenceClient::Mock(b) => b.poll(job_id).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            InferenceClient::Replicate(b) => b.model(),
            InferenceClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            InferenceClient::Replicate(b) => b.host(),
            InferenceClient::Mock(b) => b.host(),
        }
    }
}
