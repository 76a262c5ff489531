//! Amount extraction from alert text
//!
//! Patterns are tried from most to least specific; within a pattern the
//! earliest match in the text wins. The first candidate that falls inside
//! the valid range `(0, max_amount]` is returned.

use std::sync::OnceLock;

use regex::Regex;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Digits with optional western (1,234,567) or Indian (1,23,456) grouping.
re!(re_currency_prefixed,
    r"(?i)(?:\b(?:rs\.?|inr|usd|eur|gbp)|[₹$€£])\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)");
re!(re_amount_label,
    r"(?i)\bamount(?:\s*\((?:inr|usd|rs\.?)\))?\s*(?:of\s*)?[:\-]?\s*(?:rs\.?|inr|₹|\$)?\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)");
re!(re_debit_credit,
    r"(?i)\b(?:debited|credited|charged|spent|paid|deducted)\b(?:\s+(?:with|by|for|of))?\s*(?:rs\.?|inr|₹|\$)?\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)");
re!(re_bare_decimal,
    r"\b([0-9]{1,3}(?:,[0-9]{2,3})+\.[0-9]{2}|[0-9]+\.[0-9]{2})\b");
re!(re_bare_integer,
    r"\b([0-9]{1,8})\b");

/// Regex-driven amount extraction with range validation
#[derive(Debug, Clone, Copy)]
pub struct AmountParser {
    max_amount: f64,
}

impl Default for AmountParser {
    fn default() -> Self {
        Self::new(10_000_000.0)
    }
}

impl AmountParser {
    pub fn new(max_amount: f64) -> Self {
        Self { max_amount }
    }

    /// Extract the most plausible transaction amount from free text
    pub fn parse(&self, text: &str) -> Option<f64> {
        let patterns = [
            re_currency_prefixed(),
            re_amount_label(),
            re_debit_credit(),
            re_bare_decimal(),
            re_bare_integer(),
        ];

        patterns.iter().find_map(|re| {
            re.captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .filter_map(|m| parse_number(m.as_str()))
                .find(|v| self.is_valid(*v))
        })
    }

    /// Strictly positive and not above the ceiling
    pub fn is_valid(&self, amount: f64) -> bool {
        amount.is_finite() && amount > 0.0 && amount <= self.max_amount
    }

    /// Validate a loosely formatted amount (e.g. `"Rs.1,299.00"` from a model answer).
    ///
    /// A plain number is taken as is. Otherwise the alert patterns run over the
    /// value, and as a last resort everything except digits and the decimal
    /// point is stripped, along with any leading point left by a currency prefix.
    pub fn sanitize(&self, raw: &str) -> Option<f64> {
        let value = parse_number(raw.trim())
            .or_else(|| self.parse(raw))
            .or_else(|| {
                let digits: String = raw
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.')
                    .collect();
                digits.trim_start_matches('.').parse::<f64>().ok()
            })?;
        self.is_valid(value).then_some(value)
    }

    pub fn max_amount(&self) -> f64 {
        self.max_amount
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim_end_matches(',').replace(',', "");
    cleaned.parse::<f64>().ok()
}
