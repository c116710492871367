//! Pull proxy configuration.
//!
//! Retry and timeout settings are loaded from environment variables prefixed
//! with `PULL_PROXY_`. Unparsable values are logged and fall back to their
//! defaults; only inconsistent combinations are rejected.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default retry budget (negative means retry forever).
pub const DEFAULT_RETRY_COUNT: i32 = -1;

/// Default delay before the first retry, in seconds.
pub const DEFAULT_RECONNECT_DELAY_MIN_SECS: u64 = 2;

/// Default upper bound on the retry delay, in seconds.
pub const DEFAULT_RECONNECT_DELAY_MAX_SECS: u64 = 60;

/// Default increase of the retry delay per consecutive failure, in seconds.
pub const DEFAULT_RECONNECT_DELAY_STEP_SECS: u64 = 3;

/// Default bound on a single connect attempt, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const ENV_RETRY_COUNT: &str = "PULL_PROXY_RETRY_COUNT";
const ENV_DELAY_MIN: &str = "PULL_PROXY_RECONNECT_DELAY_MIN_SECS";
const ENV_DELAY_MAX: &str = "PULL_PROXY_RECONNECT_DELAY_MAX_SECS";
const ENV_DELAY_STEP: &str = "PULL_PROXY_RECONNECT_DELAY_STEP_SECS";
const ENV_CONNECT_TIMEOUT: &str = "PULL_PROXY_CONNECT_TIMEOUT_SECS";
const ENV_STANDING_CONNECTION: &str = "PULL_PROXY_STANDING_CONNECTION";

/// Retry and timeout settings for one proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Retries allowed after consecutive failures (default: -1, unlimited).
    pub retry_count: i32,

    /// Delay before the first retry (default: 2s).
    pub reconnect_delay_min: Duration,

    /// Upper bound on the retry delay (default: 60s).
    pub reconnect_delay_max: Duration,

    /// Delay increase per consecutive failure (default: 3s).
    pub reconnect_delay_step: Duration,

    /// Bound on a single connect attempt (default: 10s).
    pub connect_timeout: Duration,

    /// Re-pull after an active close instead of stopping (default: false).
    pub standing_connection: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            reconnect_delay_min: Duration::from_secs(DEFAULT_RECONNECT_DELAY_MIN_SECS),
            reconnect_delay_max: Duration::from_secs(DEFAULT_RECONNECT_DELAY_MAX_SECS),
            reconnect_delay_step: Duration::from_secs(DEFAULT_RECONNECT_DELAY_STEP_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            standing_connection: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl ProxyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let retry_count = parse_or(vars, ENV_RETRY_COUNT, DEFAULT_RETRY_COUNT);

        let reconnect_delay_min = secs_or(vars, ENV_DELAY_MIN, DEFAULT_RECONNECT_DELAY_MIN_SECS);
        let reconnect_delay_max = secs_or(vars, ENV_DELAY_MAX, DEFAULT_RECONNECT_DELAY_MAX_SECS);
        let reconnect_delay_step =
            secs_or(vars, ENV_DELAY_STEP, DEFAULT_RECONNECT_DELAY_STEP_SECS);
        let connect_timeout = secs_or(vars, ENV_CONNECT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT_SECS);

        let standing_connection = vars
            .get(ENV_STANDING_CONNECTION)
            .map(String::as_str)
            .is_some_and(parse_flag);

        let config = Self {
            retry_count,
            reconnect_delay_min,
            reconnect_delay_max,
            reconnect_delay_step,
            connect_timeout,
            standing_connection,
        };
        config.validate()?;

        tracing::debug!(
            target: "pull_proxy.config",
            retry_count = config.retry_count,
            delay_min_secs = config.reconnect_delay_min.as_secs(),
            delay_max_secs = config.reconnect_delay_max.as_secs(),
            delay_step_secs = config.reconnect_delay_step.as_secs(),
            connect_timeout_secs = config.connect_timeout.as_secs(),
            standing_connection = config.standing_connection,
            "Loaded proxy configuration"
        );

        Ok(config)
    }

    /// Reject combinations the backoff policy cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect_delay_min > self.reconnect_delay_max {
            return Err(ConfigError::InvalidValue(format!(
                "reconnect_delay_min ({}s) exceeds reconnect_delay_max ({}s)",
                self.reconnect_delay_min.as_secs(),
                self.reconnect_delay_max.as_secs()
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "connect_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn secs_or(vars: &HashMap<String, String>, key: &str, default: u64) -> Duration {
    Duration::from_secs(parse_or(vars, key, default))
}

/// Parse `key` if set, keeping `default` when it is missing or malformed.
fn parse_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> T
where
    T: FromStr + fmt::Display,
{
    let Some(raw) = vars.get(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(
            target: "pull_proxy.config",
            key,
            value = %raw,
            default = %default,
            "Unparsable configuration value, using default"
        );
        default
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Render an upstream URL for logs with any `user:password@` part masked.
#[must_use]
pub fn url_for_log(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = url.get(authority_start..).unwrap_or_default();
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = rest.get(..authority_end).unwrap_or_default();

    match authority.rfind('@') {
        Some(at) => {
            let host = authority.get(at + 1..).unwrap_or_default();
            let tail = rest.get(authority_end..).unwrap_or_default();
            let scheme = url.get(..authority_start).unwrap_or_default();
            format!("{scheme}[REDACTED]@{host}{tail}")
        }
        None => url.to_string(),
    }
}
