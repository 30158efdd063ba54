//! Configuration management for jobsync
//!
//! Configuration is loaded from a TOML file or from `JOBSYNC_*` environment
//! variables and validated before a session is built. Every section has
//! defaults, so a file only needs to name what it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote service endpoints
    #[serde(default)]
    pub services: ServicesConfig,

    /// Status poll loop
    #[serde(default)]
    pub poller: PollerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Workspace whose jobs are tracked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Job execution service endpoint
    pub job_service_url: String,

    /// User and job state service endpoint
    pub job_state_url: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Extra attempts after a transport failure
    pub retry_count: u32,

    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Token forwarded in the `Authorization` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            job_service_url: String::from("https://kbase.us/services/njs_wrapper"),
            job_state_url: String::from("https://kbase.us/services/userandjobstate"),
            request_timeout_secs: 30,
            retry_count: 2,
            retry_delay_ms: 500,
            auth_token: None,
        }
    }
}

/// Status poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Seconds between two sweeps
    pub interval_secs: u64,

    /// Start the loop once initialization finishes
    pub start_on_init: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            start_on_init: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from `JOBSYNC_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let services = ServicesConfig {
            job_service_url: env_string("JOBSYNC_JOB_SERVICE_URL")
                .unwrap_or(defaults.services.job_service_url),
            job_state_url: env_string("JOBSYNC_JOB_STATE_URL")
                .unwrap_or(defaults.services.job_state_url),
            request_timeout_secs: env_parse(
                "JOBSYNC_REQUEST_TIMEOUT",
                defaults.services.request_timeout_secs,
            )?,
            retry_count: env_parse("JOBSYNC_RETRY_COUNT", defaults.services.retry_count)?,
            retry_delay_ms: env_parse("JOBSYNC_RETRY_DELAY_MS", defaults.services.retry_delay_ms)?,
            auth_token: env_string("JOBSYNC_AUTH_TOKEN").or_else(|| env_string("KB_AUTH_TOKEN")),
        };

        let poller = PollerConfig {
            interval_secs: env_parse("JOBSYNC_POLL_INTERVAL", defaults.poller.interval_secs)?,
            start_on_init: env_parse("JOBSYNC_START_POLLER", defaults.poller.start_on_init)?,
        };

        let logging = LoggingConfig {
            level: env_string("JOBSYNC_LOG_LEVEL").unwrap_or(defaults.logging.level),
            format: env_string("JOBSYNC_LOG_FORMAT").unwrap_or(defaults.logging.format),
        };

        Ok(Self {
            services,
            poller,
            logging,
            workspace_id: env_string("JOBSYNC_WORKSPACE_ID"),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.services.job_service_url.trim().is_empty() {
            return Err(ConfigError::Invalid("job_service_url must not be empty".into()));
        }

        if self.services.job_state_url.trim().is_empty() {
            return Err(ConfigError::Invalid("job_state_url must not be empty".into()));
        }

        if self.services.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be greater than 0".into()));
        }

        if self.poller.interval_secs == 0 {
            return Err(ConfigError::Invalid("poller interval_secs must be greater than 0".into()));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging format must be \"text\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.services.request_timeout_secs)
    }

    /// Get delay between retries as Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.services.retry_delay_ms)
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poller.interval_secs)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env_string(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
        None => Ok(default),
    }
}
