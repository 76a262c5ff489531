//! In-memory mail source
//!
//! Understands the same `FROM`/`SUBJECT`/`BODY` queries the ingestor issues
//! (case-insensitive substring match). Failures can be injected per message
//! and for login.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::MailboxError;

use super::MailSource;

#[derive(Debug, Clone)]
struct StoredMessage {
    from: String,
    subject: String,
    body: String,
    raw: Vec<u8>,
}

/// Mock mailbox for tests
///
/// `closed` and the fetch counters are shared between clones so a test can
/// keep a handle after moving the source into an ingestor.
#[derive(Debug, Clone, Default)]
pub struct MockMailSource {
    messages: BTreeMap<String, StoredMessage>,
    fetch_failures: HashMap<String, MailboxError>,
    login_error: Option<MailboxError>,
    fetch_delay: HashMap<String, Duration>,
    authenticated: bool,
    closed: Arc<AtomicBool>,
    fetches: Arc<AtomicUsize>,
    active_fetches: Arc<AtomicUsize>,
    peak_fetches: Arc<AtomicUsize>,
}

/// Counts a fetch as running until dropped, so cancelled fetches are released too
struct ActiveFetch(Arc<AtomicUsize>);

impl ActiveFetch {
    fn start(active: &Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(active.clone())
    }
}

impl Drop for ActiveFetch {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockMailSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-part text message
    pub fn with_message(mut self, id: &str, from: &str, subject: &str, body: &str) -> Self {
        let raw = format!(
            "From: {}\r\nSubject: {}\r\nDate: Tue, 05 Mar 2024 10:00:00 +0000\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            from, subject, body
        );
        self.messages.insert(
            id.to_string(),
            StoredMessage {
                from: from.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
                raw: raw.into_bytes(),
            },
        );
        self
    }

    /// Add a message from raw RFC 822 text; searchable by its From/Subject lines
    pub fn with_raw_message(mut self, id: &str, raw: &str) -> Self {
        let header = |name: &str| {
            raw.lines()
                .find_map(|l| l.strip_prefix(name))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        let body = raw
            .split_once("\r\n\r\n")
            .or_else(|| raw.split_once("\n\n"))
            .map(|(_, b)| b.to_string())
            .unwrap_or_default();
        self.messages.insert(
            id.to_string(),
            StoredMessage {
                from: header("From:"),
                subject: header("Subject:"),
                body,
                raw: raw.as_bytes().to_vec(),
            },
        );
        self
    }

    /// Make `fetch(id)` fail with `error`
    pub fn failing_fetch(mut self, id: &str, error: MailboxError) -> Self {
        self.fetch_failures.insert(id.to_string(), error);
        self
    }

    /// Make `fetch(id)` sleep before answering
    pub fn slow_fetch(mut self, id: &str, delay: Duration) -> Self {
        self.fetch_delay.insert(id.to_string(), delay);
        self
    }

    /// Make `authenticate` fail with `error`
    pub fn rejecting_login(mut self, error: MailboxError) -> Self {
        self.login_error = Some(error);
        self
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Most fetches that were ever running at the same time
    pub fn peak_concurrent_fetches(&self) -> usize {
        self.peak_fetches.load(Ordering::SeqCst)
    }

    fn matches(message: &StoredMessage, query: &str) -> Result<bool, MailboxError> {
        let (key, value) = query
            .split_once(' ')
            .ok_or_else(|| MailboxError::Search(format!("unsupported query: {}", query)))?;
        let needle = value.trim().trim_matches('"').to_lowercase();
        let field = match key.to_uppercase().as_str() {
            "FROM" => &message.from,
            "SUBJECT" => &message.subject,
            "BODY" => &message.body,
            _ => return Err(MailboxError::Search(format!("unsupported query: {}", query))),
        };
        Ok(field.to_lowercase().contains(&needle))
    }
}

#[async_trait]
impl MailSource for MockMailSource {
    async fn authenticate(&mut self, _address: &str, _secret: &str) -> Result<(), MailboxError> {
        if let Some(ref e) = self.login_error {
            return Err(e.clone());
        }
        self.authenticated = true;
        Ok(())
    }

    async fn search(&mut self, query: &str) -> Result<Vec<String>, MailboxError> {
        if !self.authenticated {
            return Err(MailboxError::NotAuthenticated);
        }
        let mut ids = Vec::new();
        for (id, message) in &self.messages {
            if Self::matches(message, query)? {
                ids.push(id.clone());
            }
        }
        Ok(ids)
    }

    async fn fetch(&mut self, id: &str) -> Result<Vec<u8>, MailboxError> {
        if !self.authenticated {
            return Err(MailboxError::NotAuthenticated);
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let _active = ActiveFetch::start(&self.active_fetches, &self.peak_fetches);
        if let Some(delay) = self.fetch_delay.get(id) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(e) = self.fetch_failures.get(id) {
            return Err(e.clone());
        }
        self.messages
            .get(id)
            .map(|m| m.raw.clone())
            .ok_or_else(|| MailboxError::Fetch {
                id: id.to_string(),
                reason: "no such message".into(),
            })
    }

    async fn close(&mut self) -> Result<(), MailboxError> {
        self.authenticated = false;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
