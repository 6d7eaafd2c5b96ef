//! Runtime configuration for store hosts (CLI, embedding apps).
//!
//! # Invariants
//! - Every field has a default, so an empty JSON object is a valid config.
//! - `validate` must pass before a config is handed to stores.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

/// Transport timeout applied when a config does not set one.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Host configuration shared by stores and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScopeConfig {
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling logs. `None` logs to stderr.
    pub log_dir: Option<String>,
    /// Deadline applied to each tracked remote call. `0` disables it.
    pub request_timeout_ms: u64,
    /// Patient the CLI opens when none is given on the command line.
    pub patient_id: Option<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            patient_id: None,
        }
    }
}

impl ScopeConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.log_dir {
            if !Path::new(dir.trim()).is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logDir must be an absolute path, got `{dir}`"
                )));
            }
        }
        if let Some(patient_id) = &self.patient_id {
            if patient_id.trim().is_empty() {
                return Err(ConfigError::Invalid("patientId must not be blank".to_string()));
            }
        }
        Ok(())
    }

    /// Request deadline, or `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ScopeConfig, DEFAULT_REQUEST_TIMEOUT_MS};
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ScopeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ScopeConfig::default());
        assert_eq!(
            config.request_timeout(),
            Some(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
        );
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config = ScopeConfig::from_json_str(r#"{"requestTimeoutMs": 0}"#).unwrap();
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn rejects_unknown_level_and_relative_dir() {
        let err = ScopeConfig::from_json_str(r#"{"logLevel": "loud"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ScopeConfig::from_json_str(r#"{"logDir": "logs"}"#).unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ScopeConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"logLevel": "warn", "patientId": "p-1"}}"#).unwrap();

        let config = ScopeConfig::load(file.path()).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.patient_id.as_deref(), Some("p-1"));
    }
}
