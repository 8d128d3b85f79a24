//! ACME account manager
//!
//! Hands out ready-to-use accounts per `(ca, email)` and registers them with
//! the CA at most once at a time per `(provider, email)` within a process.
//!
//! # Registration flow
//!
//! 1. The provider is dispatched exhaustively; an unknown provider or a
//!    missing EAB binding fails before any network call.
//! 2. Concurrent callers with the same key join one in-flight registration
//!    and all receive its outcome, value or error.
//! 3. After the CA accepts, the store is re-read. A record written meanwhile
//!    by another process wins and is adopted; otherwise the new account is
//!    saved, and a conflicting save is resolved by adopting the winner.
//! 4. The key persisted is the one the CA bound the account to. A save
//!    failure is fatal: an account whose key is not stored cannot be reused.

use std::sync::Arc;

use certflow_config::{EabCredentials, SslProvider, SslProviderConfig};
use tracing::{debug, info, warn};

use crate::account::{AcmeAccount, RegisteredAccount, Registration};
use crate::ca::CaClient;
use crate::error::{AcmeError, StoreError};
use crate::key;
use crate::single_flight::SingleFlight;
use crate::store::AccountStore;
use crate::user::AcmeUser;

/// In-flight registrations, keyed by provider and email
pub type RegistrationGroup = SingleFlight<Result<AcmeAccount, AcmeError>>;

/// How a provider registers accounts
#[derive(Debug, Clone, Copy)]
enum Method<'a> {
    Plain,
    ExternalAccountBinding(&'a EabCredentials),
}

fn dispatch(provider: SslProvider, config: &SslProviderConfig) -> Result<Method<'_>, AcmeError> {
    match provider {
        SslProvider::LetsEncrypt | SslProvider::LetsEncryptStaging => Ok(Method::Plain),
        SslProvider::ZeroSsl | SslProvider::GoogleTrustServices => config
            .eab_for(provider)
            .filter(|eab| !eab.is_empty())
            .map(Method::ExternalAccountBinding)
            .ok_or(AcmeError::MissingEab { provider }),
    }
}

/// Single-flight key for a registration
pub fn registration_key(provider: &str, email: &str) -> String {
    format!("register_acme_user_{}_{}", provider, email)
}

/// Resolves and registers ACME accounts
pub struct AccountManager {
    store: Arc<dyn AccountStore>,
    flights: Arc<RegistrationGroup>,
}

impl AccountManager {
    /// Create a manager over a store
    ///
    /// Managers sharing `flights` de-duplicate registrations between them.
    pub fn new(store: Arc<dyn AccountStore>, flights: Arc<RegistrationGroup>) -> Self {
        Self { store, flights }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// The stored account for `(ca, email)`, or a fresh unregistered user
    ///
    /// Never contacts the CA and never persists anything.
    pub async fn resolve_account(&self, ca: &str, email: &str) -> Result<AcmeUser, AcmeError> {
        if let Some(account) = self.lookup(ca, email).await? {
            debug!(ca = %ca, email = %email, "Using stored ACME account");
            return Ok(AcmeUser::from_account(&account));
        }

        let pem = key::generate_pem().map_err(|source| AcmeError::Key {
            ca: ca.to_string(),
            email: email.to_string(),
            source,
        })?;
        debug!(ca = %ca, email = %email, "Generated new ACME account key");
        Ok(AcmeUser::new(ca, email, pem))
    }

    /// Make sure `user` is registered with the configured provider
    ///
    /// On success `user` holds the key and registration that are actually
    /// stored, which may come from a concurrent caller or process.
    pub async fn ensure_registered(
        &self,
        client: &dyn CaClient,
        provider_config: &SslProviderConfig,
        user: &mut AcmeUser,
    ) -> Result<Registration, AcmeError> {
        let provider = provider_config
            .provider()
            .map_err(|e| AcmeError::UnsupportedProvider(e.0))?;
        let method = dispatch(provider, provider_config)?;

        if let Some(registration) = user.registration() {
            return Ok(registration.clone());
        }

        let key = registration_key(&provider_config.provider, user.email());
        let outcome = self
            .flights
            .run(&key, self.register(client, provider, method, user.clone()))
            .await;
        if outcome.shared {
            debug!(
                provider = %provider,
                email = %user.email(),
                "Joined in-flight ACME registration"
            );
        }

        let account = outcome.value?;
        user.adopt(&account);
        Ok(account.resource)
    }

    async fn register(
        &self,
        client: &dyn CaClient,
        provider: SslProvider,
        method: Method<'_>,
        user: AcmeUser,
    ) -> Result<AcmeAccount, AcmeError> {
        info!(
            provider = %provider,
            ca = %user.ca(),
            email = %user.email(),
            "Registering ACME account"
        );

        let result = match method {
            Method::Plain => client.register(&user).await,
            Method::ExternalAccountBinding(eab) => client.register_with_eab(&user, eab).await,
        };
        let registered = result.map_err(|source| AcmeError::Registration {
            provider,
            email: user.email().to_string(),
            source,
        })?;

        if let Some(winner) = self.lookup(user.ca(), user.email()).await? {
            info!(
                ca = %user.ca(),
                email = %user.email(),
                "ACME account was stored concurrently, adopting it"
            );
            return Ok(winner);
        }

        let RegisteredAccount { key, registration } = registered;
        let account = AcmeAccount::new(user.ca(), user.email(), key, registration);
        match self.store.save(&account).await {
            Ok(()) => {
                info!(ca = %user.ca(), email = %user.email(), "Stored new ACME account");
                Ok(account)
            }
            Err(StoreError::Conflict { .. }) => {
                match self.lookup(user.ca(), user.email()).await? {
                    Some(winner) => {
                        info!(
                            ca = %user.ca(),
                            email = %user.email(),
                            "Lost ACME account save race, adopting stored account"
                        );
                        Ok(winner)
                    }
                    None => Err(self.persist_error(&user, StoreError::Conflict {
                        ca: user.ca().to_string(),
                        email: user.email().to_string(),
                    })),
                }
            }
            Err(e) => Err(self.persist_error(&user, e)),
        }
    }

    fn persist_error(&self, user: &AcmeUser, source: StoreError) -> AcmeError {
        warn!(
            ca = %user.ca(),
            email = %user.email(),
            error = %source,
            "Registered ACME account could not be stored"
        );
        AcmeError::Persist {
            ca: user.ca().to_string(),
            email: user.email().to_string(),
            source: Arc::new(source),
        }
    }

    async fn lookup(&self, ca: &str, email: &str) -> Result<Option<AcmeAccount>, AcmeError> {
        self.store
            .get_by_ca_and_email(ca, email)
            .await
            .map_err(|e| AcmeError::Store {
                ca: ca.to_string(),
                email: email.to_string(),
                source: Arc::new(e),
            })
    }
}
