//! Filesystem account store
//!
//! # Directory Structure
//!
//! ```text
//! storage/
//! └── accounts/
//!     ├── letsencrypt/
//!     │   └── ops@example.com.json
//!     └── zerossl/
//!         └── ops@example.com.json
//! ```
//!
//! CA names and emails are percent-encoded into path components, so distinct
//! accounts never share a file. A record whose `ca`/`email` differ from the
//! requested account is reported as [`StoreError::RecordMismatch`].
//!
//! Records are published with a hard link from a fully written temporary
//! file, so readers never see a partial record and a second writer for the
//! same account gets [`StoreError::Conflict`].

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::account::AcmeAccount;
use crate::error::StoreError;
use crate::store::AccountStore;

/// Account store writing one JSON file per account
#[derive(Debug, Clone)]
pub struct FileAccountStore {
    /// Base storage directory
    base_path: PathBuf,
}

impl FileAccountStore {
    /// Open (and create if needed) a store at the given path
    ///
    /// Directories get restrictive permissions (0700 on Unix).
    pub fn new(base_path: &Path) -> Result<Self, StoreError> {
        let accounts_path = base_path.join("accounts");
        fs::create_dir_all(&accounts_path)?;
        restrict_dir(base_path)?;
        restrict_dir(&accounts_path)?;

        info!(
            storage_path = %base_path.display(),
            "Initialized ACME account storage"
        );

        Ok(Self {
            base_path: base_path.to_path_buf(),
        })
    }

    /// Get the storage base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn ca_path(&self, ca: &str) -> PathBuf {
        self.base_path.join("accounts").join(path_component(ca))
    }

    /// Path of the record for an account
    pub fn account_path(&self, ca: &str, email: &str) -> PathBuf {
        self.ca_path(ca).join(format!("{}.json", path_component(email)))
    }

    fn load(&self, ca: &str, email: &str) -> Result<Option<AcmeAccount>, StoreError> {
        let path = self.account_path(ca, email);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(ca = %ca, email = %email, "No stored ACME account found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let account: AcmeAccount = serde_json::from_str(&content)?;
        if account.ca != ca || account.email != email {
            warn!(
                path = %path.display(),
                ca = %ca,
                email = %email,
                found_ca = %account.ca,
                found_email = %account.email,
                "Stored ACME account belongs to another account"
            );
            return Err(StoreError::RecordMismatch {
                ca: ca.to_string(),
                email: email.to_string(),
                found_ca: account.ca,
                found_email: account.email,
            });
        }

        debug!(
            ca = %ca,
            email = %email,
            created = %account.created,
            "Loaded ACME account"
        );
        Ok(Some(account))
    }

    fn store(&self, account: &AcmeAccount) -> Result<(), StoreError> {
        let dir = self.ca_path(&account.ca);
        fs::create_dir_all(&dir)?;
        restrict_dir(&dir)?;

        let path = self.account_path(&account.ca, &account.email);
        let temp_path = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        let content = serde_json::to_string_pretty(account)?;

        let published = write_private(&temp_path, content.as_bytes())
            .and_then(|()| fs::hard_link(&temp_path, &path));
        if let Err(e) = fs::remove_file(&temp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %temp_path.display(), error = %e, "Failed to remove temporary account file");
            }
        }

        match published {
            Ok(()) => {
                info!(ca = %account.ca, email = %account.email, "Saved ACME account");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StoreError::Conflict {
                ca: account.ca.clone(),
                email: account.email.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AccountStore for FileAccountStore {
    async fn get_by_ca_and_email(
        &self,
        ca: &str,
        email: &str,
    ) -> Result<Option<AcmeAccount>, StoreError> {
        let store = self.clone();
        let (ca, email) = (ca.to_string(), email.to_string());
        tokio::task::spawn_blocking(move || store.load(&ca, &email))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e)))?
    }

    async fn save(&self, account: &AcmeAccount) -> Result<(), StoreError> {
        let store = self.clone();
        let account = account.clone();
        tokio::task::spawn_blocking(move || store.store(&account))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e)))?
    }
}

/// Bytes escaped in path components; `%` itself is always escaped
const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'@')
    .remove(b'.')
    .remove(b'_')
    .remove(b'+')
    .remove(b'-');

/// Injective, file-name-safe form of a CA name or email
///
/// A leading `.` is escaped so no component is hidden, `.` or `..`. The
/// empty string maps to a lone `%`, which no escaped value can produce.
fn path_component(raw: &str) -> String {
    if raw.is_empty() {
        return "%".to_string();
    }

    let encoded = utf8_percent_encode(raw, PATH_ESCAPE).to_string();
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded,
    }
}

fn restrict_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Create a new file readable only by the owner and write it durably
fn write_private(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Registration;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, FileAccountStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileAccountStore::new(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    fn account(key: &str) -> AcmeAccount {
        AcmeAccount::new(
            "zerossl",
            "ops@example.com",
            key,
            Registration::new("https://ca.example/acct/9", json!({ "status": "valid" })),
        )
    }

    #[test]
    fn test_store_creation() {
        let (_temp_dir, store) = setup_store();
        assert!(store.base_path().join("accounts").exists());
    }

    #[tokio::test]
    async fn test_save_load() {
        let (_temp_dir, store) = setup_store();
        let saved = account("key-1");
        store.save(&saved).await.unwrap();

        let loaded = store
            .get_by_ca_and_email("zerossl", "ops@example.com")
            .await
            .unwrap();
        assert_eq!(loaded, Some(saved));

        let path = store.account_path("zerossl", "ops@example.com");
        assert!(path.ends_with("accounts/zerossl/ops@example.com.json"));

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_account() {
        let (_temp_dir, store) = setup_store();
        assert!(store
            .get_by_ca_and_email("zerossl", "nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_second_save_conflicts_without_overwriting() {
        let (_temp_dir, store) = setup_store();
        store.save(&account("key-1")).await.unwrap();

        let err = store.save(&account("key-2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let loaded = store
            .get_by_ca_and_email("zerossl", "ops@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.key, "key-1");
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let (_temp_dir, store) = setup_store();
        let path = store.account_path("zerossl", "ops@example.com");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let err = store
            .get_by_ca_and_email("zerossl", "ops@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp_dir, store) = setup_store();
        store.save(&account("key-1")).await.unwrap();

        let path = store.account_path("zerossl", "ops@example.com");
        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn test_path_component() {
        assert_eq!(path_component("ops@example.com"), "ops@example.com");
        assert_eq!(path_component("o'brien@example.com"), "o%27brien@example.com");
        assert_eq!(path_component("../etc"), "%2E.%2Fetc");
        assert_eq!(path_component(".hidden"), "%2Ehidden");
        assert_eq!(path_component(""), "%");
        assert_eq!(path_component("a/b c"), "a%2Fb%20c");
        assert_eq!(path_component("100%"), "100%25");
    }

    #[test]
    fn test_path_components_do_not_collide() {
        let raw = [
            "o'brien@example.com",
            "o_brien@example.com",
            "o%27brien@example.com",
            "a/b",
            "a_b",
            "a%2Fb",
            ".x",
            "%2Ex",
            "",
            "%",
        ];
        let encoded: std::collections::HashSet<_> = raw.iter().map(|r| path_component(r)).collect();
        assert_eq!(encoded.len(), raw.len());
    }

    #[tokio::test]
    async fn test_similar_emails_get_separate_records() {
        let (_temp_dir, store) = setup_store();
        let registration = Registration::new("https://ca.example/acct/1", json!({}));
        let underscore = AcmeAccount::new(
            "letsencrypt",
            "o_brien@example.com",
            "key-of-o_brien",
            registration.clone(),
        );
        let apostrophe = AcmeAccount::new(
            "letsencrypt",
            "o'brien@example.com",
            "key-of-o'brien",
            registration,
        );

        store.save(&underscore).await.unwrap();
        assert!(store
            .get_by_ca_and_email("letsencrypt", "o'brien@example.com")
            .await
            .unwrap()
            .is_none());

        store.save(&apostrophe).await.unwrap();
        let loaded = store
            .get_by_ca_and_email("letsencrypt", "o'brien@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.key, "key-of-o'brien");
        assert_eq!(
            store
                .get_by_ca_and_email("letsencrypt", "o_brien@example.com")
                .await
                .unwrap()
                .unwrap()
                .key,
            "key-of-o_brien"
        );
    }

    #[tokio::test]
    async fn test_record_for_another_account_is_rejected() {
        let (_temp_dir, store) = setup_store();
        let path = store.account_path("zerossl", "ops@example.com");
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let other = AcmeAccount::new(
            "zerossl",
            "dev@example.com",
            "key-of-dev",
            Registration::new("https://ca.example/acct/2", json!({})),
        );
        fs::write(&path, serde_json::to_string(&other).unwrap()).unwrap();

        let err = store
            .get_by_ca_and_email("zerossl", "ops@example.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::RecordMismatch { ref found_email, .. } if found_email == "dev@example.com"
        ));
    }
}
