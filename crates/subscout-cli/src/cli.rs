//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use subscout_core::mail::{DEFAULT_IMAP_HOST, DEFAULT_IMAP_PORT};

/// Subscout - Find the subscriptions hiding in your bank alerts
#[derive(Parser)]
#[command(name = "subscout")]
#[command(about = "Subscription discovery from bank alert emails", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ~/.config/subscout/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Mailbox connection settings
#[derive(Args, Debug, Clone)]
pub struct MailboxArgs {
    /// Mail account address
    #[arg(long, env = "MAIL_ADDRESS")]
    pub address: String,

    /// App password for the mail account
    #[arg(long, env = "MAIL_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// IMAP server host
    #[arg(long, env = "IMAP_HOST", default_value = DEFAULT_IMAP_HOST)]
    pub host: String,

    /// IMAP server port (implicit TLS)
    #[arg(long, env = "IMAP_PORT", default_value_t = DEFAULT_IMAP_PORT)]
    pub port: u16,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the mailbox, classify alerts and detect subscriptions
    Scan {
        #[command(flatten)]
        mailbox: MailboxArgs,

        /// Maximum number of messages to process (overrides config)
        #[arg(short, long)]
        max: Option<usize>,

        /// Skip the inference service and classify heuristically
        #[arg(long)]
        offline: bool,

        /// Write classified transactions to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a single message
    Classify {
        /// Raw message file (.eml)
        #[arg(short, long, conflicts_with_all = ["subject", "body"])]
        file: Option<PathBuf>,

        /// Subject line (when not reading a file)
        #[arg(short, long)]
        subject: Option<String>,

        /// Message body (when not reading a file)
        #[arg(short, long)]
        body: Option<String>,

        /// Sender address, used to identify the bank
        #[arg(long)]
        from: Option<String>,

        /// Skip the inference service and classify heuristically
        #[arg(long)]
        offline: bool,

        /// Print the transaction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect subscriptions in a transactions JSON file
    Detect {
        /// JSON array of transactions (as written by `scan --output`)
        #[arg(short, long)]
        file: PathBuf,

        /// Days ahead to list upcoming payments
        #[arg(long, default_value = "7")]
        upcoming: i64,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export detected subscriptions as ledger records
    Export {
        /// JSON array of transactions (as written by `scan --output`)
        #[arg(short, long)]
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}
