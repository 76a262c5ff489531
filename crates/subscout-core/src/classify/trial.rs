//! Trial detection shared by both classification stages, the detector and the ledger

use std::sync::OnceLock;

use regex::Regex;

pub const TRIAL_KEYWORDS: &[&str] = &["trial", "free", "test", "demo", "preview", "beta"];

/// Prefix of every low-amount reason; used to tell them apart from keyword reasons
pub const LOW_AMOUNT_REASON_PREFIX: &str = "Low amount";

fn trial_keyword_re() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?i)\b(trial|free|test|demo|preview|beta)").expect("invalid regex")
    })
}

/// Low-amount rule plus keyword scan
#[derive(Debug, Clone, Copy)]
pub struct TrialPolicy {
    threshold: f64,
}

impl Default for TrialPolicy {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl TrialPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_low_amount(&self, amount: Option<f64>) -> bool {
        matches!(amount, Some(a) if a > 0.0 && a <= self.threshold)
    }

    /// First trial keyword that starts a word in `text`
    pub fn keyword_in(&self, text: &str) -> Option<String> {
        trial_keyword_re()
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
    }

    pub fn low_amount_reason(&self, amount: f64) -> String {
        format!(
            "{} ({:.2}) at or below the trial threshold of {:.0}",
            LOW_AMOUNT_REASON_PREFIX, amount, self.threshold
        )
    }

    pub fn keyword_reason(keyword: &str) -> String {
        format!("Trial keyword '{}' found in message", keyword)
    }

    pub fn is_low_amount_reason(reason: &str) -> bool {
        reason.starts_with(LOW_AMOUNT_REASON_PREFIX)
    }

    /// Reason the charge looks like a trial, or None.
    ///
    /// The amount rule is checked first so its reason wins when both apply.
    pub fn evaluate(&self, amount: Option<f64>, text: &str) -> Option<String> {
        if let Some(a) = amount.filter(|_| self.is_low_amount(amount)) {
            return Some(self.low_amount_reason(a));
        }
        self.keyword_in(text).map(|kw| Self::keyword_reason(&kw))
    }
}
