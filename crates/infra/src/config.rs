//! Runtime configuration read from the environment.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `FINTRACK_LOCK_TIMEOUT_MS` | Bound on the account row-lock wait | unbounded |
//! | `FINTRACK_AUDIT_MAX_ATTEMPTS` | Attempts per audit record, first included | 5 |
//! | `FINTRACK_AUDIT_BASE_DELAY_MS` | First retry delay (doubles per attempt) | 50 |
//! | `FINTRACK_AUDIT_MAX_DELAY_MS` | Cap on the retry delay | 2000 |
//! | `USE_PERSISTENT_STORES` | Use the Postgres stores | `false` |
//! | `DATABASE_URL` | Postgres connection string | none |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::workers::RetryPolicy;

pub const LOCK_TIMEOUT_MS: &str = "FINTRACK_LOCK_TIMEOUT_MS";
pub const AUDIT_MAX_ATTEMPTS: &str = "FINTRACK_AUDIT_MAX_ATTEMPTS";
pub const AUDIT_BASE_DELAY_MS: &str = "FINTRACK_AUDIT_BASE_DELAY_MS";
pub const AUDIT_MAX_DELAY_MS: &str = "FINTRACK_AUDIT_MAX_DELAY_MS";
pub const USE_PERSISTENT_STORES: &str = "USE_PERSISTENT_STORES";
pub const DATABASE_URL: &str = "DATABASE_URL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")]
    MissingDatabaseUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// `None` blocks until the row lock is granted.
    pub lock_timeout: Option<Duration>,
    pub audit_retry: RetryPolicy,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: None,
            audit_retry: RetryPolicy::default(),
            use_persistent_stores: false,
            database_url: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(LOCK_TIMEOUT_MS) {
            config.lock_timeout = Some(Duration::from_millis(parse(LOCK_TIMEOUT_MS, &raw)?));
        }

        let retry = &mut config.audit_retry;
        if let Some(raw) = get(AUDIT_MAX_ATTEMPTS) {
            retry.max_attempts = parse(AUDIT_MAX_ATTEMPTS, &raw)?;
            if retry.max_attempts == 0 {
                return Err(invalid(AUDIT_MAX_ATTEMPTS, &raw, "must be at least 1"));
            }
        }
        if let Some(raw) = get(AUDIT_BASE_DELAY_MS) {
            retry.base_delay = Duration::from_millis(parse(AUDIT_BASE_DELAY_MS, &raw)?);
        }
        if let Some(raw) = get(AUDIT_MAX_DELAY_MS) {
            retry.max_delay = Duration::from_millis(parse(AUDIT_MAX_DELAY_MS, &raw)?);
        }
        if retry.max_delay < retry.base_delay {
            return Err(invalid(
                AUDIT_MAX_DELAY_MS,
                &retry.max_delay.as_millis().to_string(),
                "must not be below the base delay",
            ));
        }

        if let Some(raw) = get(USE_PERSISTENT_STORES) {
            config.use_persistent_stores = parse(USE_PERSISTENT_STORES, &raw.to_ascii_lowercase())?;
        }
        config.database_url = get(DATABASE_URL);
        if config.use_persistent_stores && config.database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, raw, &e.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
