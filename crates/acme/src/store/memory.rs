//! In-memory account store.

use crate::account::AcmeAccount;
use crate::error::StoreError;
use crate::store::AccountStore;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Account store backed by a concurrent map, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<(String, String), AcmeAccount>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_by_ca_and_email(
        &self,
        ca: &str,
        email: &str,
    ) -> Result<Option<AcmeAccount>, StoreError> {
        let key = (ca.to_string(), email.to_string());
        Ok(self.accounts.get(&key).map(|entry| entry.value().clone()))
    }

    async fn save(&self, account: &AcmeAccount) -> Result<(), StoreError> {
        let key = (account.ca.clone(), account.email.clone());
        match self.accounts.entry(key) {
            Entry::Occupied(_) => Err(StoreError::Conflict {
                ca: account.ca.clone(),
                email: account.email.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                debug!(ca = %account.ca, email = %account.email, "Stored ACME account");
                Ok(())
            }
        }
    }
}
