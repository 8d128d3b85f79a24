//! CA client seam
//!
//! [`CaClient`] is the only path from the account manager to a CA, so tests
//! can count or script registrations. [`InstantAcmeClient`] is the
//! production implementation on top of `instant-acme`.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use certflow_config::{EabCredentials, SslProvider};
use instant_acme::{Account, ExternalAccountKey, NewAccount};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::account::{RegisteredAccount, Registration};
use crate::error::CaError;
use crate::key;
use crate::user::AcmeUser;

/// Registration operations against one CA
///
/// Implementations return the key the CA bound the account to. That key is
/// the one persisted, whether or not it is the key `user` carried in.
#[async_trait]
pub trait CaClient: Send + Sync {
    /// Register an account, Terms of Service agreed
    async fn register(&self, user: &AcmeUser) -> Result<RegisteredAccount, CaError>;

    /// Register an account bound to an external account, Terms of Service agreed
    async fn register_with_eab(
        &self,
        user: &AcmeUser,
        eab: &EabCredentials,
    ) -> Result<RegisteredAccount, CaError>;
}

/// `instant-acme` backed client for one ACME directory
///
/// `instant-acme` generates the account key itself. The key is read back out
/// of the returned credentials and reported as the account key; the
/// credentials are kept verbatim in the registration body so the account can
/// be restored with `Account::from_credentials`.
#[derive(Debug, Clone)]
pub struct InstantAcmeClient {
    directory_url: String,
}

impl InstantAcmeClient {
    /// Client for a provider's production directory
    pub fn new(provider: SslProvider) -> Self {
        Self::with_directory(provider.directory_url())
    }

    /// Client for an arbitrary directory, e.g. a local test CA
    pub fn with_directory(directory_url: impl Into<String>) -> Self {
        Self {
            directory_url: directory_url.into(),
        }
    }

    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    async fn create_account(
        &self,
        user: &AcmeUser,
        eab: Option<&ExternalAccountKey>,
    ) -> Result<RegisteredAccount, CaError> {
        let contact = format!("mailto:{}", user.email());
        let contacts: Vec<&str> = if user.email().is_empty() {
            Vec::new()
        } else {
            vec![contact.as_str()]
        };
        let new_account = NewAccount {
            contact: &contacts,
            terms_of_service_agreed: true,
            only_return_existing: false,
        };

        debug!(
            directory = %self.directory_url,
            email = %user.email(),
            eab = eab.is_some(),
            "Creating ACME account"
        );
        let (account, credentials) = Account::create(&new_account, &self.directory_url, eab).await?;

        let body = serde_json::to_value(&credentials).map_err(|e| CaError::Credentials(e.to_string()))?;
        let key = account_key_pem(&body)?;
        info!(
            directory = %self.directory_url,
            email = %user.email(),
            account = %account.id(),
            "ACME account registered"
        );
        Ok(RegisteredAccount::new(key, Registration::new(account.id(), body)))
    }
}

/// PEM account key held in serialized `instant-acme` credentials
///
/// The credentials fields are private, so the key is read from their JSON
/// form, where it is base64url PKCS#8 DER under `key_pkcs8`.
pub fn account_key_pem(credentials: &Value) -> Result<String, CaError> {
    #[derive(Deserialize)]
    struct KeyInfo {
        key_pkcs8: String,
    }

    let info = KeyInfo::deserialize(credentials).map_err(|e| CaError::Credentials(e.to_string()))?;
    let der = URL_SAFE_NO_PAD
        .decode(info.key_pkcs8.trim_end_matches('='))
        .map_err(|e| CaError::Credentials(format!("account key: {}", e)))?;

    let pem_text = key::encode_pkcs8_der(&der);
    key::decode_pem(&pem_text).map_err(|e| CaError::Credentials(format!("account key: {}", e)))?;
    Ok(pem_text)
}

/// Decode a base64url EAB HMAC key, padded or not
pub fn decode_hmac_key(encoded: &str) -> Result<Vec<u8>, CaError> {
    URL_SAFE_NO_PAD
        .decode(encoded.trim().trim_end_matches('='))
        .map_err(|e| CaError::InvalidEab(e.to_string()))
}

#[async_trait]
impl CaClient for InstantAcmeClient {
    async fn register(&self, user: &AcmeUser) -> Result<RegisteredAccount, CaError> {
        self.create_account(user, None).await
    }

    async fn register_with_eab(
        &self,
        user: &AcmeUser,
        eab: &EabCredentials,
    ) -> Result<RegisteredAccount, CaError> {
        let hmac = decode_hmac_key(&eab.eab_hmac_key)?;
        let key = ExternalAccountKey::new(eab.eab_kid.clone(), &hmac);
        self.create_account(user, Some(&key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{KeyPair, PKCS_ECDSA_P256_SHA256};
    use serde_json::json;

    #[test]
    fn test_directory_per_provider() {
        assert_eq!(
            InstantAcmeClient::new(SslProvider::LetsEncryptStaging).directory_url(),
            "https://acme-staging-v02.api.letsencrypt.org/directory"
        );
        assert_eq!(
            InstantAcmeClient::new(SslProvider::ZeroSsl).directory_url(),
            SslProvider::ZeroSsl.directory_url()
        );
    }

    #[test]
    fn test_decode_hmac_key() {
        assert_eq!(decode_hmac_key("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_hmac_key("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_hmac_key("_-8").unwrap(), vec![0xff, 0xef]);
        assert!(matches!(decode_hmac_key("not base64!"), Err(CaError::InvalidEab(_))));
    }

    #[test]
    fn test_account_key_from_credentials() {
        let ca_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let credentials = json!({
            "id": "https://acme.example.com/acct/67890",
            "key_pkcs8": URL_SAFE_NO_PAD.encode(ca_key.serialize_der()),
            "urls": {
                "newNonce": "https://acme.example.com/acme/new-nonce",
                "newAccount": "https://acme.example.com/acme/new-account",
                "newOrder": "https://acme.example.com/acme/new-order"
            }
        });

        let pem_text = account_key_pem(&credentials).unwrap();
        assert_eq!(key::decode_pem(&pem_text).unwrap().serialize_der(), ca_key.serialize_der());
    }

    #[test]
    fn test_account_key_from_bad_credentials() {
        let missing = json!({ "id": "https://acme.example.com/acct/1" });
        assert!(matches!(account_key_pem(&missing), Err(CaError::Credentials(_))));

        let garbage = json!({ "key_pkcs8": "base64data" });
        assert!(matches!(account_key_pem(&garbage), Err(CaError::Credentials(_))));
    }
}
