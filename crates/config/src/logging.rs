//! Logging configuration

use certflow_common::LogFormat;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Logging section of the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormatConfig,
}

/// Log output format as written in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    #[default]
    Pretty,
    Json,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormatConfig::default(),
        }
    }
}

impl From<LogFormatConfig> for LogFormat {
    fn from(format: LogFormatConfig) -> Self {
        match format {
            LogFormatConfig::Pretty => LogFormat::Pretty,
            LogFormatConfig::Json => LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Install the global tracing subscriber described by this section
    pub fn init_tracing(&self) -> anyhow::Result<()> {
        certflow_common::init_tracing(&self.level, self.format.into())
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging level must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_maps_to_common() {
        assert_eq!(LogFormat::from(LogFormatConfig::Json), LogFormat::Json);
        assert_eq!(LogFormat::from(LogFormatConfig::Pretty), LogFormat::Pretty);
    }

    #[test]
    fn test_blank_level_is_invalid() {
        let config = LoggingConfig {
            level: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
