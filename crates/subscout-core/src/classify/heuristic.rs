//! Rule-based classification
//!
//! Deterministic and offline: used whenever the inference service is not
//! configured or any stage of the AI path fails.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::amount::AmountParser;
use crate::colors::CategoryColorRegistry;
use crate::models::{BillingCycle, ClassificationSource, SubscriptionType, Transaction};
use crate::services::{self, SERVICE_PATTERNS};

use super::trial::TrialPolicy;
use super::ClassificationInput;

pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";
pub const OTHER_CATEGORY: &str = "Other Transactions";

/// Confidence when no category keyword matched
const BASE_CONFIDENCE: u8 = 25;
const CONFIDENCE_PER_MATCH: u32 = 15;
/// Rule-based results never claim more certainty than this
pub const MAX_HEURISTIC_CONFIDENCE: u8 = 50;

/// A category, the words that suggest it, and its display color
#[derive(Debug)]
pub struct CategoryRule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub color: &'static str,
    pub subscription_type: Option<SubscriptionType>,
}

/// Ordered: on equal match counts the earlier rule wins
pub static CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        name: "Video Streaming",
        keywords: &[
            "netflix", "prime video", "hotstar", "disney", "hulu", "hbo", "youtube premium",
            "zee5", "sonyliv", "streaming",
        ],
        color: "#E50914",
        subscription_type: Some(SubscriptionType::Streaming),
    },
    CategoryRule {
        name: "Music Streaming",
        keywords: &[
            "spotify", "apple music", "gaana", "jiosaavn", "wynk", "youtube music", "tidal",
        ],
        color: "#1DB954",
        subscription_type: Some(SubscriptionType::Music),
    },
    CategoryRule {
        name: "Software & SaaS",
        keywords: &[
            "github", "notion", "slack", "figma", "adobe", "microsoft 365", "office 365",
            "zoom", "canva", "chatgpt", "openai", "saas", "software",
        ],
        color: "#6C5CE7",
        subscription_type: Some(SubscriptionType::Saas),
    },
    CategoryRule {
        name: "Cloud Services",
        keywords: &[
            "aws", "amazon web services", "google cloud", "azure", "digitalocean", "heroku",
            "vercel", "icloud", "google one", "dropbox",
        ],
        color: "#0984E3",
        subscription_type: Some(SubscriptionType::CloudPlatform),
    },
    CategoryRule {
        name: "Food Delivery",
        keywords: &[
            "swiggy", "zomato", "uber eats", "doordash", "grubhub", "deliveroo", "restaurant",
            "food", "dining", "cafe",
        ],
        color: "#FF7675",
        subscription_type: Some(SubscriptionType::FoodDelivery),
    },
    CategoryRule {
        name: "Telecom",
        keywords: &[
            "airtel", "jio", "vodafone", "bsnl", "recharge", "postpaid", "prepaid", "broadband",
            "mobile",
        ],
        color: "#00B894",
        subscription_type: Some(SubscriptionType::Telecom),
    },
    CategoryRule {
        name: "ATM Withdrawal",
        keywords: &["atm", "withdrawal", "withdrawn", "withdraw", "cash"],
        color: "#FF6B6B",
        subscription_type: None,
    },
    CategoryRule {
        name: "Transfer",
        keywords: &["transfer", "neft", "rtgs", "imps", "upi"],
        color: "#A8E6CF",
        subscription_type: None,
    },
    CategoryRule {
        name: "Payment",
        keywords: &["pos", "card payment", "bill pay", "emi", "swipe"],
        color: "#4ECDC4",
        subscription_type: None,
    },
    CategoryRule {
        name: "Shopping",
        keywords: &["amazon", "flipkart", "myntra", "purchase", "shopping", "store", "mart"],
        color: "#45B7D1",
        subscription_type: None,
    },
    CategoryRule {
        name: "Transport",
        keywords: &["uber", "ola", "rapido", "fuel", "petrol", "taxi", "metro"],
        color: "#54A0FF",
        subscription_type: None,
    },
    CategoryRule {
        name: "Bills & Utilities",
        keywords: &["electricity", "water", "gas", "bill payment", "utility", "phone"],
        color: "#FECA57",
        subscription_type: None,
    },
    CategoryRule {
        name: "Healthcare",
        keywords: &["medical", "hospital", "pharmacy", "clinic"],
        color: "#5F27CD",
        subscription_type: None,
    },
    CategoryRule {
        name: "Investment",
        keywords: &["mutual fund", "sip", "investment", "stocks"],
        color: "#00D2D3",
        subscription_type: None,
    },
];

/// Vendor-name fallbacks tried when no category keyword appears in the text
static VENDOR_HINTS: &[(&str, &[&str])] = &[
    ("Insurance", &["insurance", "assurance", "policy"]),
    ("Education", &["school", "college", "university", "academy"]),
    ("Health & Fitness", &["gym", "fitness", "yoga"]),
    ("Shopping", &[".com", "store", "shop", "mart", "retail"]),
];

const SUBSCRIPTION_INDICATORS: &[&str] = &[
    "subscription", "subscribed", "monthly", "recurring", "renewal", "renewed", "auto-debit",
    "autopay", "auto pay", "membership", "mandate", "standing instruction", "billing cycle",
    "plan",
];

const STOPWORDS: &[&str] = &[
    "your", "you", "the", "this", "that", "our", "account", "card", "bank", "a/c", "time", "date",
    "info", "amount", "least", "any", "rs", "inr", "us",
];

/// Generic words trimmed off the end of an extracted vendor
const TRAILING_NOISE: &[&str] = &[
    "subscription", "payment", "renewal", "purchase", "order", "txn", "transaction",
];

macro_rules! vendor_re {
    ($name:ident, $prefix:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| {
                Regex::new(&format!(
                    r"(?i){}([A-Za-z0-9][A-Za-z0-9&'@.*\- ]{{1,40}}?)(?:\s+(?:on|via|using|for|ref|with|from|towards|is|has|was|and)\b|\.(?:\s|$)|[,;:\n(]|$)",
                    $prefix
                ))
                .expect("invalid regex")
            })
        }
    };
}

vendor_re!(re_paid_to, r"\bpaid\s+to\s+");
vendor_re!(re_merchant_label, r"\bmerchant(?:\s+name)?\s*[:\-]\s*");
vendor_re!(re_at, r"\bat\s+");
vendor_re!(re_towards, r"\btowards\s+");
vendor_re!(re_to_vpa, r"\bto\s+(?:vpa\s+)?");
vendor_re!(re_for, r"\bfor\s+");

/// Keyword/regex classifier
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    amounts: AmountParser,
    trial: TrialPolicy,
    colors: Arc<CategoryColorRegistry>,
}

impl HeuristicClassifier {
    pub fn new(amounts: AmountParser, trial: TrialPolicy, colors: Arc<CategoryColorRegistry>) -> Self {
        Self {
            amounts,
            trial,
            colors,
        }
    }

    /// Classify one message without any network access
    pub fn classify(&self, input: &ClassificationInput) -> Transaction {
        let text = format!("{} {}", input.subject, input.body);
        let lower = text.to_lowercase();

        let amount = self.amounts.parse(&text);
        let merchant = extract_vendor(&text);
        let is_subscription = is_subscription_text(&lower);

        let (category, color, rule_type, match_count) = match best_category(&lower) {
            Some((rule, count)) => (
                rule.name.to_string(),
                self.colors.register(rule.name, rule.color),
                rule.subscription_type,
                count,
            ),
            None => {
                let category = vendor_category(&merchant).unwrap_or(OTHER_CATEGORY);
                (category.to_string(), self.colors.color_for(category), None, 0)
            }
        };

        let service = services::match_service(&lower);
        let subscription_type = if is_subscription {
            Some(
                rule_type
                    .or(service.map(|s| s.subscription_type))
                    .unwrap_or(SubscriptionType::Other),
            )
        } else {
            None
        };

        let trial_reason = self.trial.evaluate(amount, &text);

        Transaction {
            message_id: input.message_id.clone(),
            date: input.date,
            description: input.subject.clone(),
            amount,
            merchant,
            category,
            color,
            confidence: confidence_for(match_count),
            bank: input.bank.clone(),
            is_subscription,
            subscription_type,
            billing_cycle: billing_cycle_hint(&lower),
            service_logo: service.map(|s| s.logo.to_string()),
            is_trial: trial_reason.is_some(),
            trial_reason,
            source: ClassificationSource::Heuristic,
        }
    }
}

/// `15 x matches`, capped; flat 25 when nothing matched
pub fn confidence_for(match_count: usize) -> u8 {
    if match_count == 0 {
        return BASE_CONFIDENCE;
    }
    let score = CONFIDENCE_PER_MATCH.saturating_mul(match_count as u32);
    score.min(MAX_HEURISTIC_CONFIDENCE as u32) as u8
}

/// Category with the most keyword hits; ties keep the first rule
pub fn best_category(lower: &str) -> Option<(&'static CategoryRule, usize)> {
    let mut best: Option<(&'static CategoryRule, usize)> = None;
    for rule in CATEGORY_RULES {
        let count = rule
            .keywords
            .iter()
            .filter(|kw| contains_word(lower, kw))
            .count();
        if count > 0 && best.map_or(true, |(_, c)| count > c) {
            best = Some((rule, count));
        }
    }
    best
}

fn vendor_category(vendor: &str) -> Option<&'static str> {
    let lower = vendor.to_lowercase();
    VENDOR_HINTS
        .iter()
        .find(|(_, hints)| hints.iter().any(|h| lower.contains(h)))
        .map(|(category, _)| *category)
}

pub fn is_subscription_text(lower: &str) -> bool {
    SUBSCRIPTION_INDICATORS.iter().any(|kw| contains_word(lower, kw))
        || SERVICE_PATTERNS.iter().any(|s| contains_word(lower, s.pattern))
}

pub fn billing_cycle_hint(lower: &str) -> Option<BillingCycle> {
    const YEARLY: &[&str] = &["annual", "annually", "yearly", "per year", "12 months"];
    const QUARTERLY: &[&str] = &["quarterly", "per quarter", "3 months"];
    const MONTHLY: &[&str] = &["monthly", "per month", "every month"];

    if YEARLY.iter().any(|kw| contains_word(lower, kw)) {
        Some(BillingCycle::Yearly)
    } else if QUARTERLY.iter().any(|kw| contains_word(lower, kw)) {
        Some(BillingCycle::Quarterly)
    } else if MONTHLY.iter().any(|kw| contains_word(lower, kw)) {
        Some(BillingCycle::Monthly)
    } else {
        None
    }
}

/// Vendor from contextual phrases, then known service names, then the default
pub fn extract_vendor(text: &str) -> String {
    let patterns = [
        re_paid_to(),
        re_merchant_label(),
        re_at(),
        re_towards(),
        re_to_vpa(),
        re_for(),
    ];

    for re in patterns {
        for caps in re.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            if let Some(vendor) = clean_vendor(m.as_str()) {
                return vendor;
            }
        }
    }

    services::match_service(text)
        .map(|s| s.name.to_string())
        .unwrap_or_else(|| UNKNOWN_VENDOR.to_string())
}

fn clean_vendor(raw: &str) -> Option<String> {
    let mut words: Vec<&str> = raw
        .trim()
        .trim_end_matches(['.', '-', '*'])
        .split_whitespace()
        .collect();
    while words
        .last()
        .is_some_and(|w| TRAILING_NOISE.contains(&w.to_lowercase().as_str()))
    {
        words.pop();
    }

    let first = words.first()?.to_lowercase();
    if STOPWORDS.contains(&first.as_str()) {
        return None;
    }

    let vendor = words.join(" ");
    // Bare numbers ("at 10", "for 499.00") are amounts, not vendors
    let has_letters = vendor.chars().any(|c| c.is_alphabetic());
    (vendor.chars().count() > 3 && has_letters).then_some(vendor)
}

/// Whole-word (or whole-phrase) containment; `text` and `needle` must already be lowercase
pub fn contains_word(text: &str, needle: &str) -> bool {
    text.match_indices(needle).any(|(idx, _)| {
        let before = text[..idx].chars().next_back();
        let after = text[idx + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> HeuristicClassifier {
        HeuristicClassifier::new(
            AmountParser::default(),
            TrialPolicy::default(),
            Arc::new(CategoryColorRegistry::new()),
        )
    }

    fn input(subject: &str, body: &str) -> ClassificationInput {
        ClassificationInput {
            message_id: "1".into(),
            subject: subject.into(),
            body: body.into(),
            bank: "HDFC Bank".into(),
            date: None,
        }
    }

    #[test]
    fn test_netflix_trial_low_amount() {
        let tx = classifier().classify(&input("Netflix trial", "Amount: 5.00"));
        assert_eq!(tx.amount, Some(5.0));
        assert!(tx.is_trial);
        assert_eq!(tx.category, "Video Streaming");
        assert_eq!(tx.merchant, "Netflix");
        assert!(tx.is_subscription);
        assert_eq!(tx.subscription_type, Some(SubscriptionType::Streaming));
        assert_eq!(tx.source, ClassificationSource::Heuristic);
    }

    #[test]
    fn test_low_amount_forces_trial_without_keywords() {
        let tx = classifier().classify(&input("Payment alert", "Rs. 9.00 paid to Corner Shop"));
        assert!(tx.is_trial);
        assert!(TrialPolicy::is_low_amount_reason(tx.trial_reason.as_deref().unwrap()));
    }

    #[test]
    fn test_vendor_patterns() {
        assert_eq!(
            extract_vendor("Rs 450 paid to Zomato Ltd on 12-03-2024"),
            "Zomato Ltd"
        );
        assert_eq!(
            extract_vendor("Merchant: SPOTIFY INDIA, Amount: 119.00"),
            "SPOTIFY INDIA"
        );
        assert_eq!(
            extract_vendor("Your card was used at AMAZON RETAIL on 01-02"),
            "AMAZON RETAIL"
        );
        assert_eq!(extract_vendor("Nothing useful here"), UNKNOWN_VENDOR);
    }

    #[test]
    fn test_vendor_rejects_stopwords_and_short_names() {
        // "at your" is rejected, "at BigBasket" accepted
        assert_eq!(
            extract_vendor("Look at your statement. Spent at BigBasket on 3rd"),
            "BigBasket"
        );
        assert_eq!(extract_vendor("paid to ab"), UNKNOWN_VENDOR);
    }

    #[test]
    fn test_vendor_trailing_noise_removed() {
        assert_eq!(
            extract_vendor("Rs.199 debited for NETFLIX subscription."),
            "NETFLIX"
        );
    }

    #[test]
    fn test_category_most_matches_wins() {
        let (rule, count) = best_category("atm cash withdrawal of rs 2000").unwrap();
        assert_eq!(rule.name, "ATM Withdrawal");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_category_tie_keeps_first_rule() {
        // one hit for Food Delivery ("zomato") and one for Transfer ("upi")
        let (rule, _) = best_category("upi payment to zomato").unwrap();
        assert_eq!(rule.name, "Food Delivery");
    }

    #[test]
    fn test_no_keywords_falls_back_to_vendor_then_other() {
        let c = classifier();
        let tx = c.classify(&input("Alert", "Rs 1200 paid to Star Health Insurance"));
        assert_eq!(tx.category, "Insurance");
        assert_eq!(tx.confidence, 25);

        let tx = c.classify(&input("Alert", "Rs 1200 paid to Ramesh Kumar"));
        assert_eq!(tx.category, OTHER_CATEGORY);
        assert_eq!(tx.confidence, 25);
    }

    #[test]
    fn test_confidence_scale_and_cap() {
        assert_eq!(confidence_for(0), 25);
        assert_eq!(confidence_for(1), 15);
        assert_eq!(confidence_for(3), 45);
        assert_eq!(confidence_for(9), MAX_HEURISTIC_CONFIDENCE);
    }

    #[test]
    fn test_billing_cycle_hint() {
        assert_eq!(
            billing_cycle_hint("your annual plan renewed"),
            Some(BillingCycle::Yearly)
        );
        assert_eq!(
            billing_cycle_hint("monthly subscription"),
            Some(BillingCycle::Monthly)
        );
        assert_eq!(billing_cycle_hint("one-off purchase"), None);
    }

    #[test]
    fn test_contains_word_boundaries() {
        assert!(contains_word("paid via upi.", "upi"));
        assert!(!contains_word("gossip column", "sip"));
        assert!(contains_word("netflix.com renewal", "netflix"));
        assert!(contains_word("amazon web services bill", "amazon web services"));
    }

    #[test]
    fn test_same_category_same_color() {
        let c = classifier();
        let a = c.classify(&input("Spotify", "Rs 119 paid to Spotify"));
        let b = c.classify(&input("Gaana", "Rs 99 paid to Gaana Music"));
        assert_eq!(a.category, b.category);
        assert_eq!(a.color, b.color);
    }
}
