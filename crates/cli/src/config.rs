use std::time::Duration;

use scanbatch_core::backoff::BackoffConfig;
use scanbatch_core::error::CoreError;
use scanbatch_session::poller::{PollConfig, DEFAULT_MAX_RETRIES};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value: '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error(transparent)]
    Backoff(#[from] CoreError),
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL (default: `http://localhost:8888`).
    pub base_url: String,
    /// Timeout for a single HTTP request (default: 300 s, uploads can be large).
    pub request_timeout: Duration,
    pub poll: PollConfig,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                 |
    /// |----------------------------------|-------------------------|
    /// | `SCANBATCH_BASE_URL`             | `http://localhost:8888` |
    /// | `SCANBATCH_REQUEST_TIMEOUT_SECS` | `300`                   |
    /// | `SCANBATCH_POLL_BASE_MS`         | `1000`                  |
    /// | `SCANBATCH_POLL_MAX_MS`          | `30000`                 |
    /// | `SCANBATCH_MAX_POLL_RETRIES`     | `5`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("SCANBATCH_BASE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| "http://localhost:8888".into());

        let request_timeout_secs: u64 = parse_var(&lookup, "SCANBATCH_REQUEST_TIMEOUT_SECS", 300)?;
        if request_timeout_secs == 0 {
            // A zero timeout fails every request immediately.
            return Err(ConfigError::Invalid {
                var: "SCANBATCH_REQUEST_TIMEOUT_SECS",
                value: request_timeout_secs.to_string(),
            });
        }

        let defaults = BackoffConfig::default();
        let base_ms = parse_var(&lookup, "SCANBATCH_POLL_BASE_MS", defaults.base_interval.as_millis() as u64)?;
        let max_ms = parse_var(&lookup, "SCANBATCH_POLL_MAX_MS", defaults.max_interval.as_millis() as u64)?;
        let max_retries = parse_var(&lookup, "SCANBATCH_MAX_POLL_RETRIES", DEFAULT_MAX_RETRIES)?;

        let backoff = BackoffConfig {
            base_interval: Duration::from_millis(base_ms),
            max_interval: Duration::from_millis(max_ms),
            ..defaults
        };
        backoff.validate()?;

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(request_timeout_secs),
            poll: PollConfig {
                backoff,
                max_retries,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
