//! Tracing subscriber setup.

use crate::constants::DEFAULT_LOG_FILTER;
use crate::error::EngineError;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

/// `RUST_LOG` wins over the configured filter when set.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, EngineError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| EngineError::Telemetry(format!("Invalid log filter: {}", e))),
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// the dashboard summary.
pub fn init_tracing(config: &LogConfig) -> Result<(), EngineError> {
    let filter = env_filter(config)?;

    let (json, pretty) = match config.format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
        .map_err(|e| EngineError::Telemetry(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(format = ?config.format, filter = %config.filter, "Telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.filter.contains("tierboard_engine"));
    }

    #[test]
    fn test_log_format_parses() {
        let config: LogConfig = toml::from_str("filter = \"debug\"\nformat = \"json\"").unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "debug");
    }
}
