//! Tracing/logging initialization.
//!
//! Filtering comes from `RUST_LOG` (default `info`). The output format comes
//! from `FINTRACK_LOG_FORMAT`: `json` (default), `pretty` or `compact`.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "FINTRACK_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    #[default]
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown log format '{0}' (expected json, pretty or compact)")]
pub struct LogFormatError(String);

impl FromStr for LogFormat {
    type Err = LogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(LogFormatError(s.to_string())),
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing/logging for the process.
///
/// An unreadable `FINTRACK_LOG_FORMAT` falls back to JSON and is reported once
/// the subscriber is installed.
pub fn init() {
    let raw = std::env::var(LOG_FORMAT_VAR).ok();
    let parsed = raw.as_deref().map(LogFormat::from_str).transpose();

    match parsed {
        Ok(format) => init_with(format.unwrap_or_default()),
        Err(err) => {
            init_with(LogFormat::Json);
            ::tracing::warn!(error = %err, "falling back to json logs");
        }
    }
}

/// Initialize with an explicit format. Safe to call multiple times.
pub fn init_with(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    // try_init fails when a subscriber is already installed; that is fine.
    let _ = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}

/// Compact logs routed through the test harness's captured output.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .compact()
        .with_test_writer()
        .try_init();
}
