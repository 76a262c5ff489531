//! Transaction classification
//!
//! Two stages behind one entry point: the AI stage (when an inference
//! client is configured) and the rule-based stage. An AI failure of any
//! kind is logged and answered by the heuristic stage with the same input,
//! so callers always get a `Transaction`.

pub mod ai;
pub mod heuristic;
pub mod trial;

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::ai::InferenceClient;
use crate::amount::AmountParser;
use crate::banks::identify_bank;
use crate::colors::{CategoryColorRegistry, VendorCache};
use crate::config::PipelineConfig;
use crate::extract::plain_text;
use crate::models::{Message, Transaction};

pub use ai::{AiClassifier, ClassificationFailure};
pub use heuristic::HeuristicClassifier;
pub use trial::TrialPolicy;

/// Upper bound on body text handed to the classifiers
pub const MAX_BODY_CHARS: usize = 10_000;

/// What both stages classify
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationInput {
    pub message_id: String,
    pub subject: String,
    pub body: String,
    pub bank: String,
    pub date: Option<NaiveDate>,
}

impl ClassificationInput {
    /// Plain-text view of a fetched message, attributed to its bank
    pub fn from_message(message: &Message) -> Self {
        Self {
            message_id: message.id.clone(),
            subject: message.subject.clone(),
            body: plain_text(&message.body, MAX_BODY_CHARS),
            bank: identify_bank(&message.sender).to_string(),
            date: message.date.map(|d| d.date_naive()),
        }
    }
}

/// AI-first classifier with heuristic fallback
#[derive(Debug, Clone)]
pub struct TransactionClassifier {
    ai: Option<AiClassifier>,
    heuristic: HeuristicClassifier,
    colors: Arc<CategoryColorRegistry>,
    vendors: Arc<VendorCache>,
}

impl TransactionClassifier {
    /// Build both stages over shared color/vendor state.
    ///
    /// With `client == None` only the heuristic stage runs.
    pub fn new(
        config: &PipelineConfig,
        client: Option<InferenceClient>,
        colors: Arc<CategoryColorRegistry>,
        vendors: Arc<VendorCache>,
    ) -> Self {
        let amounts = AmountParser::new(config.max_amount);
        let trial = TrialPolicy::new(config.trial_threshold);
        let ai = client.map(|client| {
            AiClassifier::new(
                client,
                config.inference.clone(),
                amounts,
                trial,
                colors.clone(),
                vendors.clone(),
            )
        });
        Self {
            ai,
            heuristic: HeuristicClassifier::new(amounts, trial, colors.clone()),
            colors,
            vendors,
        }
    }

    /// Heuristic-only classifier with fresh shared state
    pub fn heuristic_only(config: &PipelineConfig) -> Self {
        Self::new(
            config,
            None,
            Arc::new(CategoryColorRegistry::new()),
            Arc::new(VendorCache::new()),
        )
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    pub fn colors(&self) -> &Arc<CategoryColorRegistry> {
        &self.colors
    }

    pub fn vendors(&self) -> &Arc<VendorCache> {
        &self.vendors
    }

    pub async fn classify(&self, input: &ClassificationInput) -> Transaction {
        if let Some(ai) = &self.ai {
            match ai.classify(input).await {
                Ok(tx) => return tx,
                Err(e) => {
                    warn!(message_id = %input.message_id, error = %e, "AI classification failed, using heuristic fallback");
                }
            }
        }
        self.classify_offline(input)
    }

    /// Heuristic stage only, reusing what the AI stage learned about the vendor this run
    pub fn classify_offline(&self, input: &ClassificationInput) -> Transaction {
        let mut tx = self.heuristic.classify(input);
        if let Some(info) = self.vendors.lookup(&tx.merchant) {
            debug!(merchant = %tx.merchant, category = %info.category, "Applying cached vendor info");
            tx.category = info.category;
            tx.color = info.color;
            if tx.is_subscription {
                tx.subscription_type = info.subscription_type.or(tx.subscription_type);
            }
            if tx.service_logo.is_none() {
                tx.service_logo = info.service_logo;
            }
        }
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::colors::VendorInfo;
    use crate::models::{ClassificationSource, SubscriptionType};
    use chrono::{TimeZone, Utc};

    fn fast_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.inference.poll_interval_secs = 0;
        config.inference.max_poll_attempts = 2;
        config
    }

    fn input(subject: &str, body: &str) -> ClassificationInput {
        ClassificationInput {
            message_id: "1".into(),
            subject: subject.into(),
            body: body.into(),
            bank: "State Bank of India".into(),
            date: None,
        }
    }

    fn with_mock(mock: MockBackend) -> TransactionClassifier {
        TransactionClassifier::new(
            &fast_config(),
            Some(InferenceClient::Mock(mock)),
            Arc::new(CategoryColorRegistry::new()),
            Arc::new(VendorCache::new()),
        )
    }

    #[tokio::test]
    async fn test_ai_success_is_used() {
        let classifier = with_mock(MockBackend::new());
        let tx = classifier
            .classify(&input("Spotify Premium", "Rs 119.00 debited"))
            .await;
        assert_eq!(tx.source, ClassificationSource::Ai);
        assert_eq!(tx.confidence, 90);
    }

    #[tokio::test]
    async fn test_submit_failure_falls_back_to_heuristic() {
        let classifier = with_mock(MockBackend::failing_submit());
        let tx = classifier
            .classify(&input("Netflix trial", "Amount: 5.00"))
            .await;
        assert_eq!(tx.source, ClassificationSource::Heuristic);
        assert!(tx.confidence <= heuristic::MAX_HEURISTIC_CONFIDENCE);
        assert!(tx.is_trial);
        assert_eq!(tx.category, "Video Streaming");
    }

    #[tokio::test]
    async fn test_every_ai_failure_mode_falls_back() {
        for mock in [
            MockBackend::with_status(crate::ai::JobStatus::Failed(Some("boom".into()))),
            MockBackend::with_status(crate::ai::JobStatus::Pending("starting".into())),
            MockBackend::with_output("not json at all"),
            MockBackend::with_output(r#"{"vendor": "x"}"#),
        ] {
            let tx = with_mock(mock).classify(&input("Alert", "Rs 250 at Cafe")).await;
            assert_eq!(tx.source, ClassificationSource::Heuristic);
        }
    }

    #[tokio::test]
    async fn test_no_client_is_heuristic_only() {
        let classifier = TransactionClassifier::heuristic_only(&PipelineConfig::default());
        assert!(!classifier.has_ai());
        let tx = classifier.classify(&input("Alert", "Rs 250 paid to Zomato")).await;
        assert_eq!(tx.source, ClassificationSource::Heuristic);
    }

    #[test]
    fn test_vendor_cache_applied_on_fallback() {
        let classifier = TransactionClassifier::heuristic_only(&PipelineConfig::default());
        classifier.vendors().record(
            "Acme Streaming Co",
            VendorInfo {
                category: "Video Streaming".into(),
                color: "#123456".into(),
                subscription_type: Some(SubscriptionType::Streaming),
                service_logo: Some("🎬".into()),
            },
        );
        let tx = classifier.classify_offline(&input(
            "Monthly subscription",
            "Rs 299 paid to Acme Streaming Co",
        ));
        assert_eq!(tx.merchant, "Acme Streaming Co");
        assert_eq!(tx.category, "Video Streaming");
        assert_eq!(tx.color, "#123456");
        assert_eq!(tx.subscription_type, Some(SubscriptionType::Streaming));
        assert_eq!(tx.service_logo.as_deref(), Some("🎬"));
    }

    #[test]
    fn test_input_from_message() {
        let message = Message {
            id: "42".into(),
            sender: "SBI <donotreply.sbiatm@alerts.sbi.co.in>".into(),
            subject: "Transaction alert".into(),
            date: Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()),
            body: "<p>Rs 500   debited</p>".into(),
        };
        let input = ClassificationInput::from_message(&message);
        assert_eq!(input.bank, "State Bank of India");
        assert_eq!(input.date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert!(!input.body.contains("<p>"));
    }
}
