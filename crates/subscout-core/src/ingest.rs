//! Mailbox ingestion
//!
//! Searches the mailbox for candidate alerts, then fetches and classifies
//! them on a bounded worker pool. The mail source is one connection behind
//! an async mutex: fetches are serialized, classification is not.
//!
//! Per-message failures (fetch, decode, timeout) drop that message and are
//! logged at debug; only authentication and session errors reach the caller.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::banks::sender_search_terms;
use crate::classify::{ClassificationInput, TransactionClassifier};
use crate::config::PipelineConfig;
use crate::error::{MailboxError, Result};
use crate::extract::parse_message;
use crate::mail::MailSource;
use crate::models::Transaction;

/// Subject terms searched in addition to the bank senders
pub const SUBJECT_KEYWORDS: &[&str] = &[
    "debited",
    "transaction",
    "payment",
    "subscription",
    "renewal",
    "receipt",
    "charged",
];

/// Body terms searched in addition to the bank senders
pub const BODY_KEYWORDS: &[&str] = &["subscription", "auto-debit", "recurring payment"];

/// Every search the ingestor issues, in order
pub fn search_queries() -> Vec<String> {
    let senders = sender_search_terms().map(|s| format!("FROM \"{}\"", s));
    let subjects = SUBJECT_KEYWORDS.iter().map(|k| format!("SUBJECT \"{}\"", k));
    let bodies = BODY_KEYWORDS.iter().map(|k| format!("BODY \"{}\"", k));
    senders.chain(subjects).chain(bodies).collect()
}

/// Newest first: numeric ids descending, non-numeric ids last
fn sort_recent_first(ids: &mut [String]) {
    ids.sort_by_key(|id| (Reverse(id.parse::<u64>().ok()), Reverse(id.clone())));
}

pub struct MailboxIngestor<S: MailSource> {
    source: Arc<Mutex<S>>,
    classifier: TransactionClassifier,
    worker_count: usize,
    message_timeout: Duration,
}

impl<S: MailSource + 'static> MailboxIngestor<S> {
    pub fn new(source: S, classifier: TransactionClassifier, config: &PipelineConfig) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            classifier,
            worker_count: config.worker_count.max(1),
            message_timeout: config.message_timeout(),
        }
    }

    pub fn classifier(&self) -> &TransactionClassifier {
        &self.classifier
    }

    /// Log in to the mail source. Auth failures are returned unchanged.
    pub async fn authenticate(
        &self,
        address: &str,
        secret: &str,
    ) -> std::result::Result<(), MailboxError> {
        let mut source = self.source.lock().await;
        source.authenticate(address, secret).await?;
        info!("Mailbox authenticated");
        Ok(())
    }

    /// Union of all search queries, deduplicated, newest first, at most `max_results`.
    ///
    /// A query the server rejects is skipped; session-level errors abort.
    pub async fn search(&self, max_results: usize) -> std::result::Result<Vec<String>, MailboxError> {
        let mut source = self.source.lock().await;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        for query in search_queries() {
            match source.search(&query).await {
                Ok(found) => {
                    debug!(query = %query, count = found.len(), "Search query finished");
                    ids.extend(found.into_iter().filter(|id| seen.insert(id.clone())));
                }
                Err(MailboxError::Search(reason)) => {
                    warn!(query = %query, reason = %reason, "Search query failed, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        sort_recent_first(&mut ids);
        ids.truncate(max_results);
        info!(count = ids.len(), "Candidate messages found");
        Ok(ids)
    }

    /// Search, then fetch and classify up to `max_messages` messages.
    ///
    /// `on_progress(completed, total)` runs after every unit, in completion
    /// order, including units that were dropped. The session is closed
    /// afterwards whether or not the batch succeeded.
    pub async fn process_all<F>(&self, max_messages: usize, on_progress: F) -> Result<Vec<Transaction>>
    where
        F: FnMut(usize, usize) + Send,
    {
        let result = self.run_batch(max_messages, on_progress).await;
        self.close().await;
        result
    }

    async fn run_batch<F>(&self, max_messages: usize, mut on_progress: F) -> Result<Vec<Transaction>>
    where
        F: FnMut(usize, usize) + Send,
    {
        let ids = self.search(max_messages).await?;
        let total = ids.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let permits = Arc::new(Semaphore::new(self.worker_count));
        let mut tasks = JoinSet::new();
        for id in ids {
            let permits = permits.clone();
            let source = self.source.clone();
            let classifier = self.classifier.clone();
            let timeout = self.message_timeout;
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return None;
                };
                match tokio::time::timeout(timeout, process_one(source, classifier, &id)).await {
                    Ok(Ok(tx)) => Some(tx),
                    Ok(Err(e)) => {
                        debug!(message_id = %id, error = %e, "Dropping message");
                        None
                    }
                    Err(_) => {
                        debug!(message_id = %id, timeout_secs = timeout.as_secs(), "Message timed out");
                        None
                    }
                }
            });
        }

        let mut transactions = Vec::with_capacity(total);
        let mut completed = 0;
        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok(Some(tx)) => transactions.push(tx),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Worker task failed"),
            }
            on_progress(completed, total);
        }

        info!(
            classified = transactions.len(),
            dropped = total - transactions.len(),
            "Batch finished"
        );
        Ok(transactions)
    }

    /// Log out; errors are logged, never returned
    pub async fn close(&self) {
        let mut source = self.source.lock().await;
        if let Err(e) = source.close().await {
            warn!(error = %e, "Failed to close mailbox session");
        }
    }
}

/// Fetch (under the connection lock), decode, classify
async fn process_one<S: MailSource>(
    source: Arc<Mutex<S>>,
    classifier: TransactionClassifier,
    id: &str,
) -> std::result::Result<Transaction, MailboxError> {
    let raw = {
        let mut source = source.lock().await;
        source.fetch(id).await?
    };
    let message = parse_message(id, &raw)?;
    let input = ClassificationInput::from_message(&message);
    Ok(classifier.classify(&input).await)
}
