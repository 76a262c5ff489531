//! Message decoding and plain-text normalization
//!
//! Turns raw RFC 822 bytes into a [`Message`] and any body (plain or HTML)
//! into bounded, whitespace-normalized plain text for the classifiers.

use chrono::{DateTime, Utc};
use mailparse::{MailHeaderMap, ParsedMail};

use crate::error::MailboxError;
use crate::models::Message;

/// Width used when rendering HTML; wide enough that lines are not wrapped mid-sentence
const HTML_RENDER_WIDTH: usize = 200;

/// Decode a fetched message into headers + plain-text body
pub fn parse_message(id: &str, raw: &[u8]) -> std::result::Result<Message, MailboxError> {
    let decode_err = |reason: String| MailboxError::Decode {
        id: id.to_string(),
        reason,
    };

    let parsed = mailparse::parse_mail(raw).map_err(|e| decode_err(e.to_string()))?;
    let headers = &parsed.headers;

    let subject = headers.get_first_value("Subject").unwrap_or_default();
    let sender = headers.get_first_value("From").unwrap_or_default();
    let date = headers
        .get_first_value("Date")
        .and_then(|d| parse_date_header(&d));

    let body = select_body(&parsed).map_err(decode_err)?;

    Ok(Message {
        id: id.to_string(),
        sender,
        subject: subject.trim().to_string(),
        date,
        body,
    })
}

/// Parse an RFC 2822 date header
pub fn parse_date_header(raw: &str) -> Option<DateTime<Utc>> {
    let ts = mailparse::dateparse(raw.trim()).ok()?;
    DateTime::from_timestamp(ts, 0)
}

/// Pick text/plain when available, otherwise render text/html
fn select_body(parsed: &ParsedMail) -> std::result::Result<String, String> {
    if parsed.subparts.is_empty() {
        let body = parsed.get_body().map_err(|e| e.to_string())?;
        let is_html = parsed.ctype.mimetype.eq_ignore_ascii_case("text/html");
        return Ok(if is_html { html_to_text(&body) } else { body });
    }

    let mut text_plain: Option<String> = None;
    let mut text_html: Option<String> = None;

    walk_parts(parsed, &mut |part| {
        let ctype = part.ctype.mimetype.to_lowercase();
        if ctype == "text/plain" && text_plain.is_none() {
            text_plain = part.get_body().ok();
        } else if ctype == "text/html" && text_html.is_none() {
            text_html = part.get_body().ok();
        }
    });

    if let Some(text) = text_plain.filter(|t| !t.trim().is_empty()) {
        return Ok(text);
    }
    if let Some(html) = text_html {
        return Ok(html_to_text(&html));
    }

    Err("no text body found".to_string())
}

fn walk_parts<F>(parsed: &ParsedMail, cb: &mut F)
where
    F: FnMut(&ParsedMail),
{
    cb(parsed);
    for part in &parsed.subparts {
        walk_parts(part, cb);
    }
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), HTML_RENDER_WIDTH)
}

/// Bounded plain-text rendering of a message body.
///
/// Bodies that still carry markup (some banks send HTML labelled as
/// text/plain) are rendered through html2text first.
pub fn plain_text(body: &str, max_chars: usize) -> String {
    let text = if looks_like_html(body) {
        html_to_text(body)
    } else {
        body.to_string()
    };
    truncate_chars(&normalize_whitespace(&text), max_chars)
}

fn looks_like_html(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("<html")
        || lower.contains("<body")
        || lower.contains("<div")
        || lower.contains("<table")
        || lower.contains("<br")
        || lower.contains("<p>")
}

/// Collapse runs of whitespace (including newlines) into single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &[u8] = b"From: HDFC Bank <alerts@hdfcbank.net>\r\n\
Subject: Rs.199.00 debited for NETFLIX\r\n\
Date: Fri, 15 Mar 2024 10:30:00 +0530\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Rs.199.00 has been debited from your card for NETFLIX subscription.\r\n";

    #[test]
    fn test_parse_plain_message() {
        let msg = parse_message("42", PLAIN).unwrap();
        assert_eq!(msg.id, "42");
        assert_eq!(msg.subject, "Rs.199.00 debited for NETFLIX");
        assert!(msg.sender.contains("alerts@hdfcbank.net"));
        assert!(msg.body.contains("NETFLIX subscription"));
        let date = msg.date.unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-15T05:00:00+00:00");
    }

    #[test]
    fn test_parse_multipart_prefers_plain() {
        let raw = b"From: alerts@bank.com\r\n\
Subject: Alert\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><body><p>HTML version</p></body></html>\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
\r\n\
Plain version\r\n\
--b1--\r\n";
        let msg = parse_message("1", raw).unwrap();
        assert!(msg.body.contains("Plain version"));
    }

    #[test]
    fn test_parse_html_only() {
        let raw = b"From: alerts@bank.com\r\n\
Subject: Alert\r\n\
Content-Type: text/html\r\n\
\r\n\
<html><body><p>Paid <b>Rs 99</b> to Spotify</p></body></html>\r\n";
        let msg = parse_message("2", raw).unwrap();
        assert!(msg.body.contains("Spotify"));
        assert!(!msg.body.contains("<p>"));
        assert!(msg.date.is_none());
    }

    #[test]
    fn test_plain_text_strips_markup_and_bounds() {
        let body = "<div>Amount:   450.00</div>\n<br>Merchant: Zomato";
        let text = plain_text(body, 1200);
        assert!(!text.contains('<'));
        assert!(text.contains("Zomato"));

        let long = "x".repeat(5000);
        assert_eq!(plain_text(&long, 1200).chars().count(), 1200);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("₹₹₹₹", 2), "₹₹");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
