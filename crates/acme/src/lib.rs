//! Certflow ACME accounts
//!
//! Account identity per `(ca, email)`: key generation, persistence, and
//! de-duplicated registration with the CA.
//!
//! # Architecture
//!
//! - [`AccountManager`] - resolves accounts and registers them
//! - [`AccountStore`] - persistence, with [`MemoryAccountStore`] and [`FileAccountStore`]
//! - [`CaClient`] - registration calls, with [`InstantAcmeClient`] for real CAs
//! - [`SingleFlight`] - keyed de-duplication of concurrent work
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use certflow_acme::{AccountManager, FileAccountStore, InstantAcmeClient, RegistrationGroup};
//! use certflow_config::{SslProvider, SslProviderConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileAccountStore::new(Path::new("/var/lib/certflow/acme"))?);
//! let manager = AccountManager::new(store, Arc::new(RegistrationGroup::new()));
//!
//! let config = SslProviderConfig::new(SslProvider::LetsEncrypt);
//! let client = InstantAcmeClient::new(SslProvider::LetsEncrypt);
//!
//! let mut user = manager.resolve_account("letsencrypt", "ops@example.com").await?;
//! manager.ensure_registered(&client, &config, &mut user).await?;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod ca;
pub mod error;
pub mod key;
pub mod manager;
pub mod single_flight;
pub mod store;
pub mod user;

pub use account::{AcmeAccount, RegisteredAccount, Registration};
pub use ca::{account_key_pem, CaClient, InstantAcmeClient};
pub use error::{AcmeError, CaError, KeyError, StoreError};
pub use manager::{registration_key, AccountManager, RegistrationGroup};
pub use single_flight::{Outcome, SingleFlight};
pub use store::{AccountStore, FileAccountStore, MemoryAccountStore};
pub use user::AcmeUser;
