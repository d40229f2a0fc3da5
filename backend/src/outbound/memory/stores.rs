//! Credential and profile stores with unique-key enforcement.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::guard;
use crate::domain::ports::{
    CredentialStore, CredentialStoreError, ProfileStore, ProfileStoreError,
};
use crate::domain::{AccountId, CredentialRecord, EmailAddress, ProfileRecord, Username};

/// Credential store keyed by account id, unique by email.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: Mutex<HashMap<AccountId, CredentialRecord>>,
    deletes_unavailable: AtomicBool,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `delete` fail with a connection error.
    pub fn set_deletes_unavailable(&self, unavailable: bool) {
        self.deletes_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    /// Whether the store holds no credentials.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create(&self, record: &CredentialRecord) -> Result<(), CredentialStoreError> {
        let mut records = guard(&self.records, CredentialStoreError::query)?;
        if records.contains_key(&record.account_id) {
            return Err(CredentialStoreError::duplicate_account(
                record.account_id.to_string(),
            ));
        }
        if records.values().any(|stored| stored.email == record.email) {
            return Err(CredentialStoreError::duplicate_email(record.email.as_str()));
        }
        records.insert(record.account_id, record.clone());
        Ok(())
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<CredentialRecord>, CredentialStoreError> {
        let records = guard(&self.records, CredentialStoreError::query)?;
        Ok(records.values().find(|stored| stored.email == *email).cloned())
    }

    async fn find_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<CredentialRecord>, CredentialStoreError> {
        let records = guard(&self.records, CredentialStoreError::query)?;
        Ok(records.get(account_id).cloned())
    }

    async fn delete(&self, account_id: &AccountId) -> Result<(), CredentialStoreError> {
        if self.deletes_unavailable.load(Ordering::SeqCst) {
            return Err(CredentialStoreError::connection("credential store is offline"));
        }
        let mut records = guard(&self.records, CredentialStoreError::query)?;
        records.remove(account_id);
        Ok(())
    }
}

/// Profile store keyed by account id, unique by username.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    records: Mutex<HashMap<AccountId, ProfileRecord>>,
    username_lookups_unavailable: AtomicBool,
}

impl MemoryProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `find_by_username` fail with a connection error.
    pub fn set_username_lookups_unavailable(&self, unavailable: bool) {
        self.username_lookups_unavailable
            .store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored profiles.
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    /// Whether the store holds no profiles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn create(&self, record: &ProfileRecord) -> Result<(), ProfileStoreError> {
        let mut records = guard(&self.records, ProfileStoreError::query)?;
        if records.contains_key(&record.account_id) {
            return Err(ProfileStoreError::duplicate_account(
                record.account_id.to_string(),
            ));
        }
        if records.values().any(|stored| stored.username == record.username) {
            return Err(ProfileStoreError::duplicate_username(
                record.username.as_str(),
            ));
        }
        records.insert(record.account_id, record.clone());
        Ok(())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<ProfileRecord>, ProfileStoreError> {
        if self.username_lookups_unavailable.load(Ordering::SeqCst) {
            return Err(ProfileStoreError::connection("profile replica is offline"));
        }
        let records = guard(&self.records, ProfileStoreError::query)?;
        Ok(records
            .values()
            .find(|stored| stored.username == *username)
            .cloned())
    }

    async fn find_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ProfileRecord>, ProfileStoreError> {
        let records = guard(&self.records, ProfileStoreError::query)?;
        Ok(records.get(account_id).cloned())
    }

    async fn delete(&self, account_id: &AccountId) -> Result<(), ProfileStoreError> {
        let mut records = guard(&self.records, ProfileStoreError::query)?;
        records.remove(account_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::domain::{DisplayAttributes, PasswordHash};

    fn credential(email: &str) -> CredentialRecord {
        CredentialRecord {
            account_id: AccountId::random(),
            email: EmailAddress::new(email).expect("email"),
            password_hash: PasswordHash::new("h"),
            created_at: Utc::now(),
        }
    }

    fn profile(username: &str) -> ProfileRecord {
        ProfileRecord {
            account_id: AccountId::random(),
            username: Username::new(username).expect("username"),
            display_attributes: DisplayAttributes::empty(),
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn second_credential_with_same_email_is_rejected() {
        let store = MemoryCredentialStore::new();
        store.create(&credential("a@x.com")).await.expect("first");
        let err = store
            .create(&credential("A@X.com"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, CredentialStoreError::DuplicateEmail { .. }));
        assert_eq!(store.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn recreating_the_same_account_reports_duplicate_account() {
        let store = MemoryCredentialStore::new();
        let record = credential("a@x.com");
        store.create(&record).await.expect("first");
        let err = store.create(&record).await.expect_err("duplicate");
        assert!(matches!(err, CredentialStoreError::DuplicateAccount { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn offline_deletes_fail_and_keep_the_record() {
        let store = MemoryCredentialStore::new();
        let record = credential("a@x.com");
        store.create(&record).await.expect("create");
        store.set_deletes_unavailable(true);
        let err = store.delete(&record.account_id).await.expect_err("offline");
        assert!(err.is_retryable());
        assert!(!store.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn usernames_are_unique_and_deletes_are_idempotent() {
        let store = MemoryProfileStore::new();
        let first = profile("bob");
        store.create(&first).await.expect("first");
        let err = store.create(&profile("bob")).await.expect_err("taken");
        assert!(matches!(err, ProfileStoreError::DuplicateUsername { .. }));

        store.delete(&first.account_id).await.expect("delete");
        store.delete(&first.account_id).await.expect("delete again");
        assert!(store.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn offline_username_lookups_still_enforce_uniqueness() {
        let store = MemoryProfileStore::new();
        store.create(&profile("bob")).await.expect("first");
        store.set_username_lookups_unavailable(true);
        let lookup = store
            .find_by_username(&Username::new("bob").expect("username"))
            .await;
        assert!(lookup.is_err());
        let err = store.create(&profile("bob")).await.expect_err("taken");
        assert!(matches!(err, ProfileStoreError::DuplicateUsername { .. }));
    }
}
