//! Configuration loading and validation for Certflow.
//!
//! The runtime configuration is a TOML document with two sections:
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [acme]
//! storage-path = "/var/lib/certflow/acme"
//!
//! [acme.ssl-provider]
//! provider = "zerossl"
//!
//! [acme.ssl-provider.config.zerossl]
//! eab-kid = "kid-123"
//! eab-hmac-key = "aG1hYy1rZXk"
//! ```
//!
//! Every field has a default, so an empty document is a valid configuration
//! that registers against Let's Encrypt production.

pub mod acme;
pub mod logging;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use acme::{
    AcmeConfig, EabCredentials, SslProvider, SslProviderConfig, SslProviderCredentials,
    UnknownSslProvider,
};
pub use logging::{LogFormatConfig, LoggingConfig};

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML or does not match the schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The document parsed but describes an unusable configuration
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level Certflow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Logging setup
    pub logging: LoggingConfig,
    /// ACME account settings
    pub acme: AcmeConfig,
}

impl Config {
    /// Parse and validate a configuration document
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_str(&content)?;

        info!(
            path = %path.display(),
            provider = %config.acme.ssl_provider.provider,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate()?;
        self.acme.validate()?;
        debug!("Configuration validated");
        Ok(())
    }
}
