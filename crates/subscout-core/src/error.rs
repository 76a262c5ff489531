//! Error types for subscout

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

/// Failures at the mailbox boundary.
///
/// The three authentication outcomes are kept distinct so a front end can
/// tell the user whether to fix the password, create an app password, or
/// retry later.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("An app-specific password is required for this account")]
    AppPasswordRequired,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Mailbox session is not authenticated")]
    NotAuthenticated,

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Fetch of message {id} failed: {reason}")]
    Fetch { id: String, reason: String },

    #[error("Message {id} could not be decoded: {reason}")]
    Decode { id: String, reason: String },
}

impl MailboxError {
    /// True for failures that end the session (no per-message retry makes sense)
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::AppPasswordRequired | Self::NotAuthenticated
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
