//! Mailbox scan command

use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde_json::json;
use subscout_core::{
    error::MailboxError,
    ingest::MailboxIngestor,
    mail::ImapMailSource,
};

use super::{build_classifier, detect_into_ledger, load_config, print_ledger, write_transactions};
use crate::cli::MailboxArgs;

/// User-facing explanation for a failed login
pub fn login_failure_message(err: &MailboxError) -> String {
    match err {
        MailboxError::InvalidCredentials => {
            "Login rejected: check the address and password".to_string()
        }
        MailboxError::AppPasswordRequired => {
            "Login rejected: this account needs an app password (enable 2-step verification and create one)"
                .to_string()
        }
        MailboxError::Connection(reason) => format!("Could not reach the mail server: {}", reason),
        other => format!("Login failed: {}", other),
    }
}

pub async fn cmd_scan(
    config_path: Option<&Path>,
    mailbox: &MailboxArgs,
    max: Option<usize>,
    offline: bool,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(max) = max {
        config.max_messages = max;
    }

    let classifier = build_classifier(&config, offline);
    let source = ImapMailSource::new(&mailbox.host, mailbox.port, &config.mailbox);
    let ingestor = MailboxIngestor::new(source, classifier, &config);

    if !json {
        println!("📬 Connecting to {}:{} as {}...", mailbox.host, mailbox.port, mailbox.address);
    }
    ingestor
        .authenticate(&mailbox.address, &mailbox.password)
        .await
        .map_err(|e| anyhow!(login_failure_message(&e)))?;

    let transactions = ingestor
        .process_all(config.max_messages, |done, total| {
            if !json {
                eprint!("\r   Classified {}/{} messages", done, total);
                let _ = std::io::stderr().flush();
            }
        })
        .await?;
    if !json {
        eprintln!();
    }

    if let Some(path) = output {
        write_transactions(path, &transactions)?;
        if !json {
            println!("   Saved {} transactions to {}", transactions.len(), path.display());
        }
    }

    let ledger = detect_into_ledger(&config, &transactions);

    if json {
        let out = json!({
            "transactions": transactions,
            "subscriptions": ledger.list(),
            "metrics": ledger.metrics(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let ai_count = transactions
        .iter()
        .filter(|t| t.source == subscout_core::models::ClassificationSource::Ai)
        .count();
    println!(
        "✅ {} transactions classified ({} by model, {} by rules)",
        transactions.len(),
        ai_count,
        transactions.len() - ai_count
    );
    print_ledger(&ledger);

    Ok(())
}
