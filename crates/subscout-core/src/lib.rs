//! Subscout Core Library
//!
//! Finds recurring charges in a mailbox full of bank alerts:
//! - Mailbox access behind a pluggable mail source (IMAP, in-memory mock)
//! - Concurrent fetch + classification with per-message timeouts
//! - Hosted-model classification with a deterministic heuristic fallback
//! - Trial detection, category colors and vendor memory
//! - Subscription detection over classified transactions
//! - An in-memory ledger with spend aggregates

pub mod ai;
pub mod amount;
pub mod banks;
pub mod classify;
pub mod colors;
pub mod config;
pub mod detect;
pub mod error;
pub mod extract;
pub mod ids;
pub mod ingest;
pub mod ledger;
pub mod mail;
pub mod models;
pub mod prompts;
pub mod services;

/// Test utilities including a mock inference server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{InferenceBackend, InferenceClient, JobStatus, MockBackend, ReplicateBackend};
pub use amount::AmountParser;
pub use classify::{
    AiClassifier, ClassificationFailure, ClassificationInput, HeuristicClassifier,
    TransactionClassifier, TrialPolicy,
};
pub use colors::{CategoryColorRegistry, VendorCache, VendorInfo};
pub use config::{InferenceConfig, PipelineConfig};
pub use detect::SubscriptionDetector;
pub use error::{Error, MailboxError, Result};
pub use ingest::MailboxIngestor;
pub use ledger::SubscriptionLedger;
pub use mail::{ImapMailSource, MailSource, MockMailSource};
pub use models::{
    AggregateMetrics, BillingCycle, ClassificationSource, Message, NewSubscription, Subscription,
    SubscriptionPatch, SubscriptionStatus, SubscriptionType, Transaction,
};
