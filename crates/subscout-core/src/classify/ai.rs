//! AI classification stage
//!
//! Submits one prediction job per message and polls it at a fixed interval.
//! Every failure is returned as a [`ClassificationFailure`]; deciding what to
//! do about it is the orchestrator's job.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::ai::parsing::parse_analysis;
use crate::ai::{AiAnalysis, InferenceBackend, InferenceClient, JobStatus, PredictionRequest};
use crate::amount::AmountParser;
use crate::colors::{CategoryColorRegistry, VendorCache, VendorInfo};
use crate::config::InferenceConfig;
use crate::error::Error;
use crate::extract::plain_text;
use crate::models::{BillingCycle, ClassificationSource, SubscriptionType, Transaction};
use crate::prompts::{classification_prompt, SYSTEM_PROMPT};

use super::trial::TrialPolicy;
use super::ClassificationInput;

/// Used when the model omits a confidence
const DEFAULT_AI_CONFIDENCE: u8 = 70;

/// Why the AI stage produced no transaction
#[derive(thiserror::Error, Debug)]
pub enum ClassificationFailure {
    #[error("submit failed: {0}")]
    Submit(Error),

    #[error("poll failed: {0}")]
    Poll(Error),

    #[error("job failed: {}", .0.as_deref().unwrap_or("no reason given"))]
    JobFailed(Option<String>),

    #[error("no result after {attempts} poll attempts")]
    NoResult { attempts: u32 },

    #[error("unparseable output: {0}")]
    Parse(Error),

    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Prompt, submit, poll, parse, validate
#[derive(Debug, Clone)]
pub struct AiClassifier {
    client: InferenceClient,
    config: InferenceConfig,
    amounts: AmountParser,
    trial: TrialPolicy,
    colors: Arc<CategoryColorRegistry>,
    vendors: Arc<VendorCache>,
}

impl AiClassifier {
    pub fn new(
        client: InferenceClient,
        config: InferenceConfig,
        amounts: AmountParser,
        trial: TrialPolicy,
        colors: Arc<CategoryColorRegistry>,
        vendors: Arc<VendorCache>,
    ) -> Self {
        Self {
            client,
            config,
            amounts,
            trial,
            colors,
            vendors,
        }
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    pub fn prediction_request(&self, input: &ClassificationInput) -> PredictionRequest {
        let body = plain_text(&input.body, self.config.body_char_limit);
        PredictionRequest {
            prompt: classification_prompt(&input.subject, &body, &input.bank),
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    pub async fn classify(
        &self,
        input: &ClassificationInput,
    ) -> Result<Transaction, ClassificationFailure> {
        let request = self.prediction_request(input);
        let job_id = self
            .client
            .submit(&request)
            .await
            .map_err(ClassificationFailure::Submit)?;
        debug!(message_id = %input.message_id, job_id = %job_id, model = %self.client.model(), "Submitted classification job");

        let output = self.wait_for_output(&job_id).await?;
        let analysis = parse_analysis(&output).map_err(ClassificationFailure::Parse)?;
        self.build_transaction(input, analysis)
    }

    /// Poll every `poll_interval` until the job finishes or attempts run out
    async fn wait_for_output(&self, job_id: &str) -> Result<String, ClassificationFailure> {
        let interval: Duration = self.config.poll_interval();
        for attempt in 1..=self.config.max_poll_attempts {
            tokio::time::sleep(interval).await;
            match self
                .client
                .poll(job_id)
                .await
                .map_err(ClassificationFailure::Poll)?
            {
                JobStatus::Succeeded(output) => {
                    debug!(job_id, attempt, "Classification job succeeded");
                    return Ok(output);
                }
                JobStatus::Failed(reason) => return Err(ClassificationFailure::JobFailed(reason)),
                JobStatus::Pending(status) => {
                    debug!(job_id, attempt, status = %status, "Classification job pending");
                }
            }
        }
        Err(ClassificationFailure::NoResult {
            attempts: self.config.max_poll_attempts,
        })
    }

    /// Validate the model's answer and apply the shared trial policy
    pub fn build_transaction(
        &self,
        input: &ClassificationInput,
        analysis: AiAnalysis,
    ) -> Result<Transaction, ClassificationFailure> {
        let vendor = non_empty(analysis.vendor).ok_or(ClassificationFailure::MissingField("vendor"))?;
        let category =
            non_empty(analysis.category).ok_or(ClassificationFailure::MissingField("category"))?;

        let amount = amount_from_value(&analysis.amount).and_then(|raw| self.amounts.sanitize(&raw));

        let color = match analysis.color.as_deref().filter(|c| is_hex_color(c)) {
            Some(c) => self.colors.register(&category, c),
            None => self.colors.color_for(&category),
        };

        let subscription_type = analysis
            .subscription_type
            .as_deref()
            .filter(|s| !s.eq_ignore_ascii_case("null"))
            .and_then(|s| s.parse::<SubscriptionType>().ok());
        let billing_cycle = analysis
            .billing_cycle
            .as_deref()
            .and_then(|s| s.parse::<BillingCycle>().ok());
        let service_logo = non_empty(analysis.service_logo);

        let text = format!("{} {}", input.subject, input.body);
        let trial_reason = self.trial.evaluate(amount, &text).or_else(|| {
            analysis.is_trial.then(|| {
                non_empty(analysis.trial_reason).unwrap_or_else(|| "Flagged as trial by model".into())
            })
        });

        self.vendors.record(
            &vendor,
            VendorInfo {
                category: category.clone(),
                color: color.clone(),
                subscription_type,
                service_logo: service_logo.clone(),
            },
        );

        Ok(Transaction {
            message_id: input.message_id.clone(),
            date: input.date,
            description: input.subject.clone(),
            amount,
            merchant: vendor,
            category,
            color,
            confidence: confidence_percent(analysis.confidence),
            bank: input.bank.clone(),
            is_subscription: analysis.is_subscription,
            subscription_type: if analysis.is_subscription {
                subscription_type.or(Some(SubscriptionType::Other))
            } else {
                subscription_type
            },
            billing_cycle,
            service_logo,
            is_trial: trial_reason.is_some(),
            trial_reason,
            source: ClassificationSource::Ai,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

fn amount_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Models answer either a 0-1 fraction or a 0-100 percentage
fn confidence_percent(raw: Option<f64>) -> u8 {
    match raw {
        Some(c) if c.is_finite() && c >= 0.0 => {
            let pct = if c <= 1.0 { c * 100.0 } else { c };
            pct.round().min(100.0) as u8
        }
        _ => DEFAULT_AI_CONFIDENCE,
    }
}
