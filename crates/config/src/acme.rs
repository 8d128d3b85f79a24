//! ACME account configuration
//!
//! Selects the certificate authority ("SSL provider") accounts are registered
//! with and carries the External Account Binding credentials the EAB-only
//! authorities require.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ConfigError;

/// Let's Encrypt production directory URL
pub const LETSENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";
/// Let's Encrypt staging directory URL
pub const LETSENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";
/// ZeroSSL directory URL
pub const ZEROSSL_PRODUCTION: &str = "https://acme.zerossl.com/v2/DV90";
/// Google Trust Services directory URL
pub const GTS_PRODUCTION: &str = "https://dv.acme-v02.api.pki.goog/directory";

/// Certificate authorities accounts can be registered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SslProvider {
    LetsEncrypt,
    LetsEncryptStaging,
    ZeroSsl,
    GoogleTrustServices,
}

/// Returned when a provider string names no supported authority
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported ssl provider: {0}")]
pub struct UnknownSslProvider(pub String);

impl SslProvider {
    /// Identifier used in configuration and as the stored account's CA
    pub fn as_str(&self) -> &'static str {
        match self {
            SslProvider::LetsEncrypt => "letsencrypt",
            SslProvider::LetsEncryptStaging => "letsencrypt_staging",
            SslProvider::ZeroSsl => "zerossl",
            SslProvider::GoogleTrustServices => "gts",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SslProvider::LetsEncrypt => "Let's Encrypt",
            SslProvider::LetsEncryptStaging => "Let's Encrypt (staging)",
            SslProvider::ZeroSsl => "ZeroSSL",
            SslProvider::GoogleTrustServices => "Google Trust Services",
        }
    }

    /// ACME directory URL of the authority
    pub fn directory_url(&self) -> &'static str {
        match self {
            SslProvider::LetsEncrypt => LETSENCRYPT_PRODUCTION,
            SslProvider::LetsEncryptStaging => LETSENCRYPT_STAGING,
            SslProvider::ZeroSsl => ZEROSSL_PRODUCTION,
            SslProvider::GoogleTrustServices => GTS_PRODUCTION,
        }
    }

    /// Whether new accounts must carry an External Account Binding
    pub fn requires_eab(&self) -> bool {
        matches!(self, SslProvider::ZeroSsl | SslProvider::GoogleTrustServices)
    }
}

impl FromStr for SslProvider {
    type Err = UnknownSslProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "letsencrypt" => Ok(SslProvider::LetsEncrypt),
            "letsencrypt_staging" => Ok(SslProvider::LetsEncryptStaging),
            "zerossl" => Ok(SslProvider::ZeroSsl),
            "gts" => Ok(SslProvider::GoogleTrustServices),
            other => Err(UnknownSslProvider(other.to_string())),
        }
    }
}

impl fmt::Display for SslProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ACME section of the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AcmeConfig {
    /// Directory holding persisted account records
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Authority new accounts are registered with
    #[serde(default)]
    pub ssl_provider: SslProviderConfig,
}

fn default_storage_path() -> PathBuf { PathBuf::from("./data/acme") }

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            ssl_provider: SslProviderConfig::default(),
        }
    }
}

impl AcmeConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.ssl_provider.validate()
    }
}

/// Selected authority plus per-authority credentials.
///
/// The provider is kept as a string: an unknown name is a registration
/// error, not a load error, so existing settings keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SslProviderConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default)]
    pub config: SslProviderCredentials,
}

fn default_provider() -> String { SslProvider::LetsEncrypt.as_str().to_string() }

impl Default for SslProviderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            config: SslProviderCredentials::default(),
        }
    }
}

impl SslProviderConfig {
    pub fn new(provider: SslProvider) -> Self {
        Self {
            provider: provider.as_str().to_string(),
            config: SslProviderCredentials::default(),
        }
    }

    /// Attach EAB credentials for an EAB authority
    pub fn with_eab(mut self, provider: SslProvider, eab: EabCredentials) -> Self {
        match provider {
            SslProvider::ZeroSsl => self.config.zerossl = eab,
            SslProvider::GoogleTrustServices => self.config.gts = eab,
            SslProvider::LetsEncrypt | SslProvider::LetsEncryptStaging => {}
        }
        self
    }

    /// Parse the configured provider name
    pub fn provider(&self) -> Result<SslProvider, UnknownSslProvider> {
        self.provider.parse()
    }

    /// EAB credentials configured for an authority, if it uses any
    pub fn eab_for(&self, provider: SslProvider) -> Option<&EabCredentials> {
        match provider {
            SslProvider::ZeroSsl => Some(&self.config.zerossl),
            SslProvider::GoogleTrustServices => Some(&self.config.gts),
            SslProvider::LetsEncrypt | SslProvider::LetsEncryptStaging => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("ssl provider must not be empty".to_string()));
        }

        if let Ok(provider) = self.provider() {
            if let Some(eab) = self.eab_for(provider) {
                if eab.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "{} requires eab-kid and eab-hmac-key",
                        provider.display_name()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Credentials for every EAB authority
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SslProviderCredentials {
    #[serde(default)]
    pub zerossl: EabCredentials,
    #[serde(default)]
    pub gts: EabCredentials,
}

/// External Account Binding key id and base64url HMAC key
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EabCredentials {
    #[serde(default, alias = "eabKid")]
    pub eab_kid: String,
    #[serde(default, alias = "eabHmacKey")]
    pub eab_hmac_key: String,
}

impl EabCredentials {
    pub fn new(kid: impl Into<String>, hmac_key: impl Into<String>) -> Self {
        Self {
            eab_kid: kid.into(),
            eab_hmac_key: hmac_key.into(),
        }
    }

    /// True when either half of the binding is missing
    pub fn is_empty(&self) -> bool {
        self.eab_kid.is_empty() || self.eab_hmac_key.is_empty()
    }
}

impl fmt::Debug for EabCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EabCredentials")
            .field("eab_kid", &self.eab_kid)
            .field("eab_hmac_key", &"<redacted>")
            .finish()
    }
}
