//! Session tuning knobs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a [`SessionConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid session config: {0}")]
    Invalid(String),

    #[error("failed to read session config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse session config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Timing and storage settings shared by every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a failed CDN host stays blacklisted, in milliseconds.
    pub cdn_blacklist_ttl_ms: u64,
    /// A link expiring within this window is treated as already expired.
    pub expiry_margin_ms: u64,
    /// Minimum spacing between two progress heartbeats for one item.
    pub heartbeat_interval_ms: u64,
    /// Minimum spacing between two heartbeat failure log lines for one item.
    pub heartbeat_failure_log_interval_ms: u64,
    /// Ceiling used by [`crate::session::RecoveryBudget`].
    pub max_consecutive_recoveries: u32,
    /// Directory that receives generated DASH manifests.
    pub manifest_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cdn_blacklist_ttl_ms: 10 * 60 * 1000,
            expiry_margin_ms: 60 * 1000,
            heartbeat_interval_ms: 5 * 1000,
            heartbeat_failure_log_interval_ms: 60 * 1000,
            max_consecutive_recoveries: 3,
            manifest_dir: std::env::temp_dir().join("playback-session"),
        }
    }
}

impl SessionConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cdn_blacklist_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "cdn_blacklist_ttl_ms must be positive".to_string(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_ms must be positive".to_string(),
            ));
        }
        if self.heartbeat_failure_log_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_failure_log_interval_ms must be positive".to_string(),
            ));
        }
        if self.manifest_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("manifest_dir is empty".to_string()));
        }
        Ok(())
    }

    pub fn cdn_blacklist_ttl(&self) -> Duration {
        Duration::from_millis(self.cdn_blacklist_ttl_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SessionConfig::default();
        assert_eq!(config.cdn_blacklist_ttl(), Duration::from_secs(600));
        assert_eq!(config.expiry_margin_ms, 60_000);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(config.heartbeat_failure_log_interval_ms, 60_000);
        assert_eq!(config.max_consecutive_recoveries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            SessionConfig::from_json_str(r#"{"heartbeat_interval_ms": 10000}"#).unwrap();
        assert_eq!(config.heartbeat_interval_ms, 10_000);
        assert_eq!(config.cdn_blacklist_ttl_ms, 600_000);
    }

    #[test]
    fn rejects_zero_ttl() {
        let err = SessionConfig::from_json_str(r#"{"cdn_blacklist_ttl_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"max_consecutive_recoveries": 5}"#).unwrap();

        let config = SessionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_consecutive_recoveries, 5);
    }
}
