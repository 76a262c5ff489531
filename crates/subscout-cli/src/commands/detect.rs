//! Subscription detection command

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use super::{detect_into_ledger, load_config, print_ledger, read_transactions, truncate};

pub fn cmd_detect(config_path: Option<&Path>, file: &Path, upcoming_days: i64, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let transactions = read_transactions(file)?;
    let ledger = detect_into_ledger(&config, &transactions);
    let today = Utc::now().date_naive();

    if json {
        let upcoming: Vec<_> = ledger
            .upcoming_payments(today, upcoming_days)
            .into_iter()
            .map(|(sub, date)| json!({ "id": sub.id, "service_name": sub.service_name, "due": date }))
            .collect();
        let out = json!({
            "subscriptions": ledger.list(),
            "metrics": ledger.metrics_as_of(today),
            "upcoming": upcoming,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("🔍 {} transactions loaded from {}", transactions.len(), file.display());
    print_ledger(&ledger);

    let upcoming = ledger.upcoming_payments(today, upcoming_days);
    if !upcoming.is_empty() {
        println!();
        println!("📅 Due in the next {} days", upcoming_days);
        for (sub, date) in upcoming {
            println!("   {} │ {:20} │ {:>10.2}", date, truncate(&sub.service_name, 20), sub.amount);
        }
    }

    Ok(())
}
