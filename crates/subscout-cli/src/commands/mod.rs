//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `scan` - Mailbox scan (authenticate, ingest, detect, summarize)
//! - `classify` - Single-message classification
//! - `detect` - Subscription detection over saved transactions
//! - `export` - Ledger record export (CSV, JSON)

pub mod classify;
pub mod detect;
pub mod export;
pub mod scan;

// Re-export command functions for main.rs
pub use classify::*;
pub use detect::*;
pub use export::*;
pub use scan::*;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use subscout_core::{
    ai::InferenceClient,
    classify::{TransactionClassifier, TrialPolicy},
    colors::{CategoryColorRegistry, VendorCache},
    config::PipelineConfig,
    detect::SubscriptionDetector,
    ledger::SubscriptionLedger,
    models::{Subscription, Transaction},
};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(path).context("Failed to load configuration")
}

/// Classifier with the inference client from the environment, unless `offline`
pub fn build_classifier(config: &PipelineConfig, offline: bool) -> TransactionClassifier {
    let client = if offline {
        None
    } else {
        let client = InferenceClient::from_env();
        if client.is_none() {
            tracing::info!("REPLICATE_API_TOKEN not set, classifying heuristically");
        }
        client
    };
    TransactionClassifier::new(
        config,
        client,
        Arc::new(CategoryColorRegistry::new()),
        Arc::new(VendorCache::new()),
    )
}

pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of transactions", path.display()))
}

pub fn write_transactions(path: &Path, transactions: &[Transaction]) -> Result<()> {
    let json = serde_json::to_string_pretty(transactions)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Detect subscriptions and load them into a fresh ledger
pub fn detect_into_ledger(config: &PipelineConfig, transactions: &[Transaction]) -> SubscriptionLedger {
    let trial = TrialPolicy::new(config.trial_threshold);
    let detected = SubscriptionDetector::new(trial).detect(transactions);
    let mut ledger = SubscriptionLedger::new(trial);
    ledger.merge_detected(detected);
    ledger
}

fn status_icon(sub: &Subscription) -> &'static str {
    match sub.status {
        subscout_core::models::SubscriptionStatus::Active => "✅",
        subscout_core::models::SubscriptionStatus::Trial => "🧪",
        subscout_core::models::SubscriptionStatus::Inactive => "⏸️",
    }
}

/// Table of subscriptions followed by spend totals
pub fn print_ledger(ledger: &SubscriptionLedger) {
    if ledger.is_empty() {
        println!("No subscriptions detected.");
        return;
    }

    println!();
    println!("📋 Detected Subscriptions");
    println!("   ─────────────────────────────────────────────────────────────");
    for sub in ledger.list() {
        println!(
            "   {} {} {:20} │ {:>10.2}/{:<9} │ {:3}% │ {} charge(s) since {}",
            status_icon(sub),
            sub.service_logo.as_deref().unwrap_or(" "),
            truncate(&sub.service_name, 20),
            sub.amount,
            sub.billing_cycle.label(),
            sub.confidence,
            sub.transaction_count,
            sub.start_date,
        );
        if let Some(reason) = &sub.trial_reason {
            println!("        trial: {}", reason);
        }
    }

    let metrics = ledger.metrics();
    println!();
    println!("💰 Spend");
    println!("   Monthly:             {:>10.2}", metrics.total_monthly);
    println!("   Yearly:              {:>10.2}", metrics.total_yearly);
    println!(
        "   Rest of year ({:>2}mo): {:>10.2}",
        metrics.months_remaining, metrics.remaining_year_projection
    );
    for (category, monthly) in &metrics.by_category {
        println!("   {:20} {:>10.2}/mo", truncate(category, 20), monthly);
    }
}
