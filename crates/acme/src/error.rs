//! ACME account error types

use std::io;
use std::sync::Arc;

use certflow_config::SslProvider;
use thiserror::Error;

/// Errors returned by the account manager
///
/// `Clone` so that one de-duplicated registration outcome can be handed to
/// every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum AcmeError {
    /// The configured provider name is not a known authority
    #[error("unsupported ssl provider: {0}")]
    UnsupportedProvider(String),

    /// An EAB authority was selected without its binding credentials
    #[error("{provider} requires EAB credentials (eab-kid, eab-hmac-key)")]
    MissingEab { provider: SslProvider },

    /// Generating or decoding the account key failed
    #[error("account key error for '{email}' at {ca}: {source}")]
    Key {
        ca: String,
        email: String,
        #[source]
        source: KeyError,
    },

    /// Reading the account store failed
    #[error("failed to look up account '{email}' at {ca}: {source}")]
    Store {
        ca: String,
        email: String,
        #[source]
        source: Arc<StoreError>,
    },

    /// The authority rejected the registration
    #[error("failed to register '{email}' with {provider}: {source}")]
    Registration {
        provider: SslProvider,
        email: String,
        #[source]
        source: CaError,
    },

    /// The authority accepted the registration but it could not be stored
    #[error("failed to save registration for '{email}' at {ca}: {source}")]
    Persist {
        ca: String,
        email: String,
        #[source]
        source: Arc<StoreError>,
    },
}

/// Account key codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    Generation(String),

    #[error("invalid private key PEM: {0}")]
    Parse(String),

    /// PEM block the codec does not read, e.g. a SEC1 `EC PRIVATE KEY`
    #[error("unsupported private key format '{0}', expected PKCS#8 'PRIVATE KEY'")]
    UnsupportedFormat(String),

    #[error("account key must be ECDSA P-256")]
    UnexpectedAlgorithm,
}

/// Errors specific to account storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failed to serialize/deserialize a record
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A record for this account already exists
    #[error("account '{email}' at {ca} already exists")]
    Conflict { ca: String, email: String },

    /// The record found at an account's location belongs to another account
    #[error("record for '{email}' at {ca} holds account '{found_email}' at {found_ca}")]
    RecordMismatch {
        ca: String,
        email: String,
        found_ca: String,
        found_email: String,
    },
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Errors reported by a CA client
#[derive(Debug, Clone, Error)]
pub enum CaError {
    /// ACME protocol error, including problem documents from the CA
    #[error("ACME protocol error: {0}")]
    Protocol(String),

    /// The EAB HMAC key could not be decoded
    #[error("invalid EAB HMAC key: {0}")]
    InvalidEab(String),

    /// The account credentials could not be captured
    #[error("failed to capture account credentials: {0}")]
    Credentials(String),
}

impl From<instant_acme::Error> for CaError {
    fn from(e: instant_acme::Error) -> Self {
        CaError::Protocol(e.to_string())
    }
}
