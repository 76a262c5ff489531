//! Mock backend for testing
//!
//! Answers from a keyword lookup over the prompt, or from a fixed script.
//! Useful for unit tests and offline runs without an inference token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::amount::AmountParser;
use crate::error::{Error, Result};
use crate::services;

use super::types::{JobStatus, PredictionRequest};
use super::InferenceBackend;

#[derive(Debug, Clone)]
enum Reply {
    /// Derive the answer from the submitted prompt
    FromPrompt,
    Output(String),
    Status(JobStatus),
}

/// Mock inference backend
///
/// Cloning shares the call counters, so a test can keep a handle while the
/// classifier owns another.
#[derive(Debug, Clone)]
pub struct MockBackend {
    reply: Reply,
    submit_error: Option<String>,
    pending_polls: usize,
    poll_delay: Option<Duration>,
    jobs: Arc<Mutex<HashMap<String, (String, usize)>>>,
    submits: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
    /// Jobs submitted but not yet answered
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Succeeds on the first poll with an answer derived from the prompt
    pub fn new() -> Self {
        Self {
            reply: Reply::FromPrompt,
            submit_error: None,
            pending_polls: 0,
            poll_delay: None,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            submits: Arc::new(AtomicUsize::new(0)),
            polls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every submit fails as if the service returned HTTP 500
    pub fn failing_submit() -> Self {
        Self {
            submit_error: Some("Prediction submit returned 500 Internal Server Error".into()),
            ..Self::new()
        }
    }

    /// Succeed with exactly `output`
    pub fn with_output(output: &str) -> Self {
        Self {
            reply: Reply::Output(output.to_string()),
            ..Self::new()
        }
    }

    /// Every poll returns `status` (e.g. a failed job, or pending forever)
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            reply: Reply::Status(status),
            ..Self::new()
        }
    }

    /// Report the job as processing this many times before the final answer
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Sleep this long inside every poll, like a slow service
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    /// Most jobs that were ever submitted and unanswered at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

/// Keyword answer in the same JSON shape the real model is asked for
pub(crate) fn answer_for(prompt: &str) -> String {
    let amount = AmountParser::default().parse(prompt);
    let value = match services::match_service(prompt) {
        Some(service) => json!({
            "amount": amount.map(|a| format!("{:.2}", a)),
            "vendor": service.name,
            "category": service.category,
            "color": service.color,
            "confidence": 0.9,
            "is_subscription": true,
            "subscription_type": service.subscription_type.as_str(),
            "billing_cycle": "monthly",
            "service_logo": service.logo,
            "is_trial": false,
        }),
        None => json!({
            "amount": amount.map(|a| format!("{:.2}", a)),
            "vendor": "Unknown Vendor",
            "category": "Other Transactions",
            "confidence": 0.6,
            "is_subscription": false,
            "is_trial": false,
        }),
    };
    value.to_string()
}

#[async_trait]
impl InferenceBackend for MockBackend {
    async fn submit(&self, request: &PredictionRequest) -> Result<String> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        if let Some(ref msg) = self.submit_error {
            return Err(Error::Inference(msg.clone()));
        }
        let job_id = format!("mock-job-{}", n + 1);
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| Error::Inference("Mock job table poisoned".into()))?;
        jobs.insert(job_id.clone(), (request.prompt.clone(), 0));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Ok(job_id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| Error::Inference("Mock job table poisoned".into()))?;
        let (prompt, seen) = jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;

        if *seen < self.pending_polls {
            *seen += 1;
            return Ok(JobStatus::Pending("processing".into()));
        }

        let status = match &self.reply {
            Reply::FromPrompt => JobStatus::Succeeded(answer_for(prompt)),
            Reply::Output(text) => JobStatus::Succeeded(text.clone()),
            Reply::Status(status) => status.clone(),
        };
        if !matches!(status, JobStatus::Pending(_)) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(status)
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
