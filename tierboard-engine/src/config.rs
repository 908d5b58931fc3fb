//! Configuration loading for the tierboard engine.
//!
//! Connection and scheduling fields are required. Labeling, cache, roster and
//! logging fall back to defaults when omitted.

use crate::constants::MAX_UTC_OFFSET_MINUTES;
use crate::telemetry::LogConfig;
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tierboard_client::BackendConfig;

/// Where quartile labels come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelingMode {
    /// Use the bucket each row arrived in.
    #[default]
    Backend,
    /// Relabel locally by cumulative share of the grand total.
    CumulativeShare,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub reset_interval_ms: u64,
    /// Offset from UTC used to decide what "today" is.
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub labeling: LabelingMode,
    #[serde(default)]
    pub cache_ttl_ms: Option<u64>,
    /// Fixed-roster agents to pad into the fourth quartile when absent.
    #[serde(default)]
    pub roster: Vec<String>,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or TIERBOARD_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(invalid("api_base_url", "must not be empty"));
        }
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(invalid("api_base_url", "must start with http:// or https://"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be > 0"));
        }
        if self.reset_interval_ms <= self.poll_interval_ms {
            return Err(invalid("reset_interval_ms", "must be > poll_interval_ms"));
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(invalid("utc_offset_minutes", "must be within +/- 840"));
        }
        if self.cache_ttl_ms == Some(0) {
            return Err(invalid("cache_ttl_ms", "must be > 0 when set"));
        }
        if self
            .cache_ttl_ms
            .is_some_and(|ttl| ttl >= self.poll_interval_ms)
        {
            return Err(invalid("cache_ttl_ms", "must be < poll_interval_ms"));
        }
        if self.roster.iter().any(|agent| agent.trim().is_empty()) {
            return Err(invalid("roster", "entries must not be empty"));
        }
        if self.log.filter.trim().is_empty() {
            return Err(invalid("log.filter", "must not be empty"));
        }
        Ok(())
    }

    pub fn backend(&self) -> BackendConfig {
        BackendConfig {
            api_base_url: self.api_base_url.clone(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| invalid("utc_offset_minutes", "out of range"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reset_interval(&self) -> Duration {
        Duration::from_millis(self.reset_interval_ms)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_ms.map(Duration::from_millis)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("TIERBOARD_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
