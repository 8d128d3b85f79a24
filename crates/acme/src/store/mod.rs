//! Account store implementations.

mod file;
mod memory;

pub use file::FileAccountStore;
pub use memory::MemoryAccountStore;

use crate::account::AcmeAccount;
use crate::error::StoreError;
use async_trait::async_trait;

/// Persistent registry of accounts, keyed by `(ca, email)`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up the account registered for an email at a CA.
    async fn get_by_ca_and_email(
        &self,
        ca: &str,
        email: &str,
    ) -> Result<Option<AcmeAccount>, StoreError>;

    /// Persist a new account.
    ///
    /// Never overwrites: returns [`StoreError::Conflict`] if a record for the
    /// same `(ca, email)` already exists.
    async fn save(&self, account: &AcmeAccount) -> Result<(), StoreError>;
}
