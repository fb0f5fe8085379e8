//! Client configuration and tunables
//!
//! Connection settings come from the command line, falling back to the
//! `SQUAD_HOST` and `SQUAD_TOKEN` environment variables. Verbosity comes from
//! `LOG_LEVEL`.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Maximum number of objects fetched from a single endpoint; keeps
/// pagination from looping forever.
pub const MAX_NUM_OF_OBJECTS: usize = 10_000_000;

/// Number of objects loaded by listing helpers when no count is given.
pub const DEFAULT_NUM_OF_OBJECTS: usize = 50;

/// Maximum page size accepted by SQUAD.
pub const SQUAD_MAX_PAGE_LIMIT: usize = 1000;

/// Size cap for every input file (results, metrics, metadata, logs,
/// attachments, job definitions).
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Default location of the response cache database.
pub const CACHE_FILE: &str = "squad_client_cache.sqlite";

/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Verbosity accepted in `LOG_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Error,
}

impl LogLevel {
    /// Reads `LOG_LEVEL`, ignoring unknown values.
    pub fn from_env() -> Self {
        std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(Error::Config(format!("Unknown log level: {}", other))),
        }
    }
}

/// Settings used to build a [`crate::api::SquadApi`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the SQUAD instance
    pub url: String,

    /// Optional authentication token
    pub token: Option<String>,

    /// Timeout applied to every HTTP request
    pub timeout: Duration,

    /// Seconds a cached GET response stays valid; 0 disables caching
    pub cache_ttl: u64,

    /// Where the response cache lives
    pub cache_path: PathBuf,

    /// Upper bound on objects returned by a single fetch
    pub max_objects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: String::new(),
            token: None,
            timeout: Duration::from_secs(60),
            cache_ttl: 0,
            cache_path: PathBuf::from(CACHE_FILE),
            max_objects: MAX_NUM_OF_OBJECTS,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        ClientConfig {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache(mut self, ttl: u64) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// Check the values that cannot be caught by the URL validator
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::Config(
                "Either --squad-host or SQUAD_HOST env variable are required".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::Config("Timeout must be greater than 0".to_string()));
        }

        if self.max_objects == 0 {
            return Err(Error::Config(
                "Maximum number of objects must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("ERROR".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("debug".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Debug.as_filter(), "debug");
        assert_eq!(LogLevel::default().as_filter(), "info");
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::new("http://localhost:8000");
        assert_eq!(config.url, "http://localhost:8000");
        assert!(config.token.is_none());
        assert_eq!(config.cache_ttl, 0);
        assert_eq!(config.max_objects, MAX_NUM_OF_OBJECTS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let config = ClientConfig::new("http://localhost").with_token(Some(String::new()));
        assert!(config.token.is_none());
    }

    #[test]
    fn test_missing_url() {
        let result = ClientConfig::default().validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("SQUAD_HOST"));
    }

    #[test]
    fn test_zero_ceiling() {
        let config = ClientConfig::new("http://localhost").with_max_objects(0);
        assert!(config.validate().is_err());
    }
}
