//! TOML configuration for store and logging bootstrap.

use crate::logging::parse_level;
use crate::store::CallContext;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Store and logging settings.
///
/// ```toml
/// database_path = "blog.sqlite3"
/// busy_timeout_ms = 5000
/// statement_timeout_ms = 2000
/// wal = true
/// log_level = "info"
/// log_dir = "logs"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite file; `None` opens an in-memory database.
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    /// Deadline applied to each top-level call.
    pub statement_timeout_ms: Option<u64>,
    pub wal: bool,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            statement_timeout_ms: None,
            wal: true,
            log_level: None,
            log_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        if self.statement_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "statement_timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(level) = &self.log_level {
            parse_level(level)
                .map_err(|_| ConfigError::Invalid(format!("unknown log_level `{level}`")))?;
        }
        if self
            .database_path
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid(
                "database_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Fresh call context carrying the configured statement timeout.
    pub fn call_context(&self) -> CallContext {
        match self.statement_timeout_ms {
            Some(timeout_ms) => CallContext::new().with_timeout(Duration::from_millis(timeout_ms)),
            None => CallContext::new(),
        }
    }
}

pub fn parse_config(text: &str) -> Result<StoreConfig, ConfigError> {
    let config: StoreConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<StoreConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

#[cfg(test)]
mod tests {
    use super::{load_config, parse_config, ConfigError, StoreConfig};
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(parse_config("").unwrap(), StoreConfig::default());
    }

    #[test]
    fn parses_all_fields() {
        let config = parse_config(
            r#"
database_path = "blog.sqlite3"
busy_timeout_ms = 250
statement_timeout_ms = 1000
wal = false
log_level = "debug"
log_dir = "logs"
"#,
        )
        .unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("blog.sqlite3")));
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(!config.wal);
        assert!(config.call_context().deadline().is_some());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            parse_config("databse_path = \"x\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            parse_config("statement_timeout_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("log_level = \"loud\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blogdb.toml");
        std::fs::write(&path, "busy_timeout_ms = 10\n").unwrap();
        assert_eq!(load_config(&path).unwrap().busy_timeout_ms, 10);
        assert!(matches!(
            load_config(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
