//! Port abstraction for the credential store (hashed passwords by email).
use async_trait::async_trait;

use crate::domain::{AccountId, CredentialRecord, EmailAddress};

use super::define_port_error;

define_port_error! {
    /// Errors raised by credential store adapters.
    pub enum CredentialStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "credential store connection failed: {message}" => retryable,
        /// The call did not finish within its deadline.
        Timeout { operation: String } => "credential store {operation} timed out" => retryable,
        /// Query or mutation failed during execution.
        Query { message: String } => "credential store query failed: {message}" => retryable,
        /// Another credential already uses the email.
        DuplicateEmail { email: String } => "email {email} is already registered",
        /// A credential already exists for the account identifier.
        DuplicateAccount { account_id: String } => "credential for account {account_id} already exists",
    }
}

/// Durable store of credential records keyed by account id, unique by email.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new credential record.
    ///
    /// Uniqueness violations are reported as
    /// [`CredentialStoreError::DuplicateEmail`] or
    /// [`CredentialStoreError::DuplicateAccount`].
    async fn create(&self, record: &CredentialRecord) -> Result<(), CredentialStoreError>;

    /// Fetch the credential registered for an email.
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<CredentialRecord>, CredentialStoreError>;

    /// Fetch the credential for an account.
    async fn find_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<CredentialRecord>, CredentialStoreError>;

    /// Delete the credential for an account. Deleting a missing record
    /// succeeds.
    async fn delete(&self, account_id: &AccountId) -> Result<(), CredentialStoreError>;
}
