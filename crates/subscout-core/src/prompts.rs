//! Prompts for the transaction classification call
//!
//! Templates use mustache-style `{{var}}` placeholders.

use std::collections::HashMap;

pub const SYSTEM_PROMPT: &str = "You are a financial transaction analyst. You read bank alert \
emails and extract structured data about the payment they describe. You answer with a single \
JSON object and nothing else.";

const CLASSIFY_TRANSACTION: &str = r#"Analyze this bank transaction email.

Bank: {{bank}}
Subject: {{subject}}
Body:
{{body}}

Respond with JSON only, using exactly these keys:
{"amount": "numeric amount without currency symbol",
 "vendor": "merchant or service name",
 "category": "spending category, e.g. Video Streaming, Music Streaming, Software & SaaS, Food Delivery, Telecom, Cloud Services, Shopping, Transport, Bills & Utilities",
 "color": "hex color for the category, e.g. #E50914",
 "confidence": 0.0,
 "is_subscription": false,
 "subscription_type": "streaming | music | saas | food_delivery | telecom | cloud_platform | other | null",
 "billing_cycle": "monthly | quarterly | yearly | null",
 "service_logo": "single emoji for the service",
 "is_trial": false,
 "trial_reason": "why this looks like a trial, or null"}

A charge of 10 or less, or words like trial, free, demo, preview or beta, indicate a trial."#;

/// Replace every `{{key}}` in `template`
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}

/// User prompt for one message; `body` must already be plain text and bounded
pub fn classification_prompt(subject: &str, body: &str, bank: &str) -> String {
    let vars = HashMap::from([("subject", subject), ("body", body), ("bank", bank)]);
    render(CLASSIFY_TRANSACTION, &vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_prompt_fills_placeholders() {
        let prompt = classification_prompt("Netflix renewal", "Rs 499 debited", "HDFC Bank");
        assert!(prompt.contains("Subject: Netflix renewal"));
        assert!(prompt.contains("Rs 499 debited"));
        assert!(prompt.contains("Bank: HDFC Bank"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let vars = HashMap::from([("a", "1")]);
        assert_eq!(render("{{a}} {{b}}", &vars), "1 {{b}}");
    }
}
