//! Ledger export command

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use super::{detect_into_ledger, load_config, read_transactions};
use crate::cli::ExportFormat;

/// Write flat records as CSV; the header is the union of keys in sorted order
pub fn write_csv<W: Write>(records: &[BTreeMap<String, String>], writer: W) -> Result<()> {
    let mut headers: Vec<&String> = records.iter().flat_map(|r| r.keys()).collect();
    headers.sort();
    headers.dedup();

    let mut csv = csv::Writer::from_writer(writer);
    if !headers.is_empty() {
        csv.write_record(&headers)?;
    }
    for record in records {
        let row = headers
            .iter()
            .map(|h| record.get(*h).map(String::as_str).unwrap_or(""));
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(records: &[BTreeMap<String, String>], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    Ok(())
}

pub fn cmd_export(
    config_path: Option<&Path>,
    file: &Path,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let transactions = read_transactions(file)?;
    let ledger = detect_into_ledger(&config, &transactions);
    let records = ledger.export_records();

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };

    match format {
        ExportFormat::Csv => write_csv(&records, writer)?,
        ExportFormat::Json => write_json(&records, writer)?,
    }

    if let Some(path) = output {
        eprintln!("✅ Exported {} subscriptions to {}", records.len(), path.display());
    }
    Ok(())
}
