//! Single-message classification command

use std::path::Path;

use anyhow::{bail, Context, Result};
use subscout_core::{
    banks::identify_bank,
    classify::ClassificationInput,
    extract::{parse_message, plain_text},
    models::Transaction,
};

use super::{build_classifier, load_config};

/// Build classifier input from an .eml file or a subject/body pair
pub fn classification_input(
    file: Option<&Path>,
    subject: Option<&str>,
    body: Option<&str>,
    from: Option<&str>,
) -> Result<ClassificationInput> {
    if let Some(path) = file {
        let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "message".to_string());
        let mut message = parse_message(&id, &raw)
            .with_context(|| format!("Failed to decode {}", path.display()))?;
        if let Some(from) = from {
            message.sender = from.to_string();
        }
        return Ok(ClassificationInput::from_message(&message));
    }

    if subject.is_none() && body.is_none() {
        bail!("Provide --file, or --subject and/or --body");
    }
    Ok(ClassificationInput {
        message_id: "cli".to_string(),
        subject: subject.unwrap_or_default().to_string(),
        body: plain_text(body.unwrap_or_default(), subscout_core::classify::MAX_BODY_CHARS),
        bank: identify_bank(from.unwrap_or_default()).to_string(),
        date: None,
    })
}

pub fn print_transaction(tx: &Transaction) {
    let amount = tx
        .amount
        .map(|a| format!("{:.2}", a))
        .unwrap_or_else(|| "?".to_string());

    println!();
    println!("🧾 {} {}", tx.service_logo.as_deref().unwrap_or(""), tx.merchant);
    println!("   Amount:       {}", amount);
    println!("   Category:     {} ({})", tx.category, tx.color);
    println!("   Bank:         {}", tx.bank);
    println!("   Confidence:   {}% via {:?}", tx.confidence, tx.source);
    if tx.is_subscription {
        let kind = tx.subscription_type.map(|t| t.as_str()).unwrap_or("other");
        let cycle = tx.billing_cycle.map(|c| c.label()).unwrap_or("unknown cycle");
        println!("   Subscription: yes ({}, {})", kind, cycle);
    } else {
        println!("   Subscription: no");
    }
    if let Some(reason) = &tx.trial_reason {
        println!("   Trial:        {}", reason);
    }
}

pub async fn cmd_classify(
    config_path: Option<&Path>,
    file: Option<&Path>,
    subject: Option<&str>,
    body: Option<&str>,
    from: Option<&str>,
    offline: bool,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let input = classification_input(file, subject, body, from)?;
    let classifier = build_classifier(&config, offline);

    let tx = classifier.classify(&input).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    } else {
        print_transaction(&tx);
    }
    Ok(())
}
