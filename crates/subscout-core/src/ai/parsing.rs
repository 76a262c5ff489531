//! JSON extraction from model output
//!
//! Models wrap their answer in prose or code fences; the first balanced
//! brace-delimited span is taken as the payload.

use crate::error::{Error, Result};

use super::types::AiAnalysis;

/// First balanced `{...}` span in `text`, ignoring braces inside JSON strings
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the model's classification answer
pub fn parse_analysis(response: &str) -> Result<AiAnalysis> {
    let response = response.trim();
    let json_str = extract_json_object(response).ok_or_else(|| {
        Error::InvalidData(format!("No JSON found in AI response | Raw: {}", truncate(response)))
    })?;

    serde_json::from_str(json_str).map_err(|e| {
        Error::InvalidData(format!("Invalid JSON from AI: {} | Raw: {}", e, truncate(json_str)))
    })
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let text = r#"Sure! Here is the analysis: {"vendor": "Netflix", "amount": "499"} Hope it helps."#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"vendor": "Netflix", "amount": "499"}"#)
        );
    }

    #[test]
    fn test_extract_json_takes_first_object() {
        let text = r#"{"a": {"b": 1}} and then {"c": 2}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn test_extract_json_ignores_braces_in_strings() {
        let text = r#"{"vendor": "weird } name", "x": 1}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_extract_json_unbalanced() {
        assert_eq!(extract_json_object(r#"{"vendor": "Netflix""#), None);
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn test_parse_analysis() {
        let response = r##"```json
{"amount": "₹499.00", "vendor": "Netflix", "category": "Video Streaming",
 "color": "#E50914", "confidence": 0.92, "is_subscription": true,
 "subscription_type": "streaming", "billing_cycle": "monthly",
 "service_logo": "🎬", "is_trial": false}
```"##;
        let analysis = parse_analysis(response).unwrap();
        assert_eq!(analysis.vendor.as_deref(), Some("Netflix"));
        assert_eq!(analysis.amount, serde_json::json!("₹499.00"));
        assert_eq!(analysis.confidence, Some(0.92));
        assert!(analysis.is_subscription);
        assert!(!analysis.is_trial);
    }

    #[test]
    fn test_parse_analysis_errors() {
        assert!(matches!(
            parse_analysis("I could not find a transaction."),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            parse_analysis(r#"{"vendor": 12"#),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            parse_analysis(r#"{"vendor": ["not", "a", "string"]}"#),
            Err(Error::InvalidData(_))
        ));
    }
}
