//! Pipeline configuration
//!
//! All tunables have defaults, so a config file is optional. Values are
//! resolved in this order (later wins):
//!
//! 1. Built-in defaults
//! 2. `~/.config/subscout/config.toml` (or the path passed to [`PipelineConfig::load`])
//! 3. Environment variables (`SUBSCOUT_MAX_MESSAGES`, `SUBSCOUT_WORKERS`)
//!
//! ```toml
//! max_messages = 100
//! worker_count = 10
//! message_timeout_secs = 30
//!
//! [inference]
//! poll_interval_secs = 2
//! max_poll_attempts = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Top-level configuration for one processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on messages fetched and classified per run
    pub max_messages: usize,
    /// Size of the fetch+classify worker pool
    pub worker_count: usize,
    /// Per-message budget for fetch + classification
    pub message_timeout_secs: u64,
    /// Mailbox folder to search
    pub mailbox: String,
    /// Amounts above this are rejected as parse noise
    pub max_amount: f64,
    /// Amounts at or below this are treated as trial charges
    pub trial_threshold: f64,
    pub inference: InferenceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_messages: 50,
            worker_count: 10,
            message_timeout_secs: 30,
            mailbox: "INBOX".to_string(),
            max_amount: 10_000_000.0,
            trial_threshold: 10.0,
            inference: InferenceConfig::default(),
        }
    }
}

/// Settings for the external inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    /// Message body is cut to this many characters before prompting
    pub body_char_limit: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            max_poll_attempts: 30,
            body_char_limit: 1200,
            max_tokens: 500,
            temperature: 0.1,
        }
    }
}

impl InferenceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl PipelineConfig {
    /// Load configuration from `path` (or the default location) and apply env overrides.
    ///
    /// A missing file at the default location is not an error; a missing file at an
    /// explicitly given path is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("subscout").join("config.toml"))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<usize>("SUBSCOUT_MAX_MESSAGES") {
            self.max_messages = v;
        }
        if let Some(v) = env_parse::<usize>("SUBSCOUT_WORKERS") {
            self.worker_count = v;
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::Config("worker_count must be at least 1".into()));
        }
        if self.max_amount <= 0.0 {
            return Err(Error::Config("max_amount must be positive".into()));
        }
        if self.trial_threshold < 0.0 || self.trial_threshold >= self.max_amount {
            return Err(Error::Config(
                "trial_threshold must be between 0 and max_amount".into(),
            ));
        }
        Ok(())
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_secs(self.message_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.worker_count, 10);
        assert_eq!(config.message_timeout(), Duration::from_secs(30));
        assert_eq!(config.inference.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.inference.max_poll_attempts, 30);
        assert_eq!(config.inference.body_char_limit, 1200);
        assert_eq!(config.trial_threshold, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "max_messages = 5\nmailbox = \"Alerts\"\n\n[inference]\nmax_poll_attempts = 3"
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_messages, 5);
        assert_eq!(config.mailbox, "Alerts");
        assert_eq!(config.inference.max_poll_attempts, 3);
        assert_eq!(config.inference.poll_interval_secs, 2);
        assert_eq!(config.worker_count, 10);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = PipelineConfig::load(Some(Path::new("/nonexistent/subscout.toml")));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = PipelineConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
