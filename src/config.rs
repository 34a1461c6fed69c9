//! History engine configuration
//!
//! Loaded from a JSON file; every field has a default, so `{}` is a
//! valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::DEFAULT_IDLE_TIMEOUT_SECS;
use crate::diff::NO_CHANGES_MESSAGE;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Io(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Version history configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Extra attempts after a numbering conflict (default: 5)
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Session idle timeout in seconds (default: 900)
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,

    /// Commit message of version 0 (default: "baseline")
    #[serde(default = "default_baseline_message")]
    pub baseline_message: String,

    /// Commit message when an edit changes nothing (default: "No changes detected")
    #[serde(default = "default_no_changes_message")]
    pub no_changes_message: String,

    /// Verify content hashes when decrypting a version for display (default: true)
    #[serde(default = "default_verify_content_hash")]
    pub verify_content_hash: bool,

    /// Append-only audit log file; none means audit records are discarded
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,
}

fn default_max_conflict_retries() -> u32 {
    5
}

fn default_session_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS as u64
}

fn default_baseline_message() -> String {
    "baseline".to_string()
}

fn default_no_changes_message() -> String {
    NO_CHANGES_MESSAGE.to_string()
}

fn default_verify_content_hash() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
            baseline_message: default_baseline_message(),
            no_changes_message: default_no_changes_message(),
            verify_content_hash: default_verify_content_hash(),
            audit_log_path: None,
        }
    }
}

impl HistoryConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: HistoryConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "session_idle_timeout_secs must be positive".to_string(),
            ));
        }
        if self.session_idle_timeout_secs > i64::MAX as u64 / 1000 {
            return Err(ConfigError::Invalid(
                "session_idle_timeout_secs is too large".to_string(),
            ));
        }
        if self.baseline_message.trim().is_empty() {
            return Err(ConfigError::Invalid("baseline_message must not be empty".to_string()));
        }
        if self.no_changes_message.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "no_changes_message must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Idle timeout to apply to new sessions.
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::seconds(self.session_idle_timeout_secs as i64)
    }
}
