//! Subscout CLI - Subscription discovery from bank alert emails
//!
//! Usage:
//!   subscout scan --address you@gmail.com     Scan the mailbox (password from MAIL_PASSWORD)
//!   subscout classify --file alert.eml        Classify one message
//!   subscout detect --file transactions.json  Detect subscriptions from a saved scan
//!   subscout export --file transactions.json  Export ledger records as CSV or JSON

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Scan {
            mailbox,
            max,
            offline,
            output,
            json,
        } => commands::cmd_scan(config_path, &mailbox, max, offline, output.as_deref(), json).await,
        Commands::Classify {
            file,
            subject,
            body,
            from,
            offline,
            json,
        } => {
            commands::cmd_classify(
                config_path,
                file.as_deref(),
                subject.as_deref(),
                body.as_deref(),
                from.as_deref(),
                offline,
                json,
            )
            .await
        }
        Commands::Detect {
            file,
            upcoming,
            json,
        } => commands::cmd_detect(config_path, &file, upcoming, json),
        Commands::Export {
            file,
            format,
            output,
        } => commands::cmd_export(config_path, &file, format, output.as_deref()),
    }
}
