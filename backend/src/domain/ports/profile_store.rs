//! Port abstraction for the profile store (public profile by username).
use async_trait::async_trait;

use crate::domain::{AccountId, ProfileRecord, Username};

use super::define_port_error;

define_port_error! {
    /// Errors raised by profile store adapters.
    pub enum ProfileStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "profile store connection failed: {message}" => retryable,
        /// The call did not finish within its deadline.
        Timeout { operation: String } => "profile store {operation} timed out" => retryable,
        /// Query or mutation failed during execution.
        Query { message: String } => "profile store query failed: {message}" => retryable,
        /// Another profile already uses the username.
        DuplicateUsername { username: String } => "username {username} is already taken",
        /// A profile already exists for the account identifier.
        DuplicateAccount { account_id: String } => "profile for account {account_id} already exists",
    }
}

/// Durable store of profile records keyed by account id, unique by username.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a new profile record.
    async fn create(&self, record: &ProfileRecord) -> Result<(), ProfileStoreError>;

    /// Fetch the profile owning a username.
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<ProfileRecord>, ProfileStoreError>;

    /// Fetch the profile for an account.
    async fn find_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ProfileRecord>, ProfileStoreError>;

    /// Delete the profile for an account. Deleting a missing record succeeds.
    async fn delete(&self, account_id: &AccountId) -> Result<(), ProfileStoreError>;
}
