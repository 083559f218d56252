//! Logging setup

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Output stream
    pub output: LogOutput,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Multi-line human-readable output
    Pretty,
    /// Single-line human-readable output
    Compact,
}

/// Log destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(ConfigError::invalid(format!("unknown log format '{other}'"))),
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber
    pub fn initialize(&self) -> Result<(), ConfigError> {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let level = env::var("RUST_LOG").unwrap_or_else(|_| self.level.clone());
        let filter = EnvFilter::try_new(&level)
            .map_err(|e| ConfigError::logging(format!("Invalid log level: {e}")))?;

        let registry = tracing_subscriber::registry().with(filter);
        let result = match (self.format, self.output) {
            (LogFormat::Json, LogOutput::Stdout) => registry.with(fmt::layer().json()).try_init(),
            (LogFormat::Json, LogOutput::Stderr) => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            (LogFormat::Pretty, LogOutput::Stdout) => {
                registry.with(fmt::layer().pretty()).try_init()
            }
            (LogFormat::Pretty, LogOutput::Stderr) => registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
            (LogFormat::Compact, LogOutput::Stdout) => {
                registry.with(fmt::layer().compact()).try_init()
            }
            (LogFormat::Compact, LogOutput::Stderr) => registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init(),
        };

        result.map_err(|e| ConfigError::logging(format!("Subscriber already installed: {e}")))
    }
}
