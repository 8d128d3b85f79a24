//! ACME account holder

use std::fmt;

use rcgen::KeyPair;

use crate::account::{AcmeAccount, Registration};
use crate::error::KeyError;
use crate::key;

/// The identity used to talk to a CA: contact email, account key and, once
/// registered, the CA's registration resource
#[derive(Clone, PartialEq)]
pub struct AcmeUser {
    ca: String,
    email: String,
    private_key_pem: String,
    registration: Option<Registration>,
}

impl AcmeUser {
    /// A user without a registration
    pub fn new(ca: impl Into<String>, email: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
        Self {
            ca: ca.into(),
            email: email.into(),
            private_key_pem: private_key_pem.into(),
            registration: None,
        }
    }

    /// A user restored from its persisted account
    pub fn from_account(account: &AcmeAccount) -> Self {
        Self {
            ca: account.ca.clone(),
            email: account.email.clone(),
            private_key_pem: account.key.clone(),
            registration: Some(account.resource.clone()),
        }
    }

    pub fn ca(&self) -> &str {
        &self.ca
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    pub fn has_registration(&self) -> bool {
        self.registration.is_some()
    }

    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    /// Decoded account key, for signing
    ///
    /// Once registered this is the key the CA bound the account to.
    pub fn private_key(&self) -> Result<KeyPair, KeyError> {
        key::decode_pem(&self.private_key_pem)
    }

    /// Take over the key and registration of a persisted account
    pub(crate) fn adopt(&mut self, account: &AcmeAccount) {
        self.private_key_pem = account.key.clone();
        self.registration = Some(account.resource.clone());
    }
}

impl fmt::Debug for AcmeUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcmeUser")
            .field("ca", &self.ca)
            .field("email", &self.email)
            .field("private_key_pem", &"<redacted>")
            .field("registration", &self.registration.as_ref().map(|r| &r.uri))
            .finish()
    }
}
