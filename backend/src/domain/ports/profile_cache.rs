//! Port abstraction for the read-through profile cache.
//!
//! The cache is never authoritative. Callers treat every error as a miss.
use async_trait::async_trait;

use crate::domain::{AccountId, ProfileRecord};

use super::define_port_error;

define_port_error! {
    /// Errors raised by profile cache adapters.
    pub enum ProfileCacheError {
        /// Cache backend is unreachable.
        Backend { message: String } => "profile cache backend failed: {message}" => retryable,
        /// The call did not finish within its deadline.
        Timeout { operation: String } => "profile cache {operation} timed out" => retryable,
        /// A cached entry could not be encoded or decoded.
        Serialization { message: String } => "profile cache serialization failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileCache: Send + Sync {
    /// Fetch a cached profile.
    async fn get(&self, account_id: &AccountId)
    -> Result<Option<ProfileRecord>, ProfileCacheError>;

    /// Overwrite the cached profile.
    async fn set(&self, profile: &ProfileRecord) -> Result<(), ProfileCacheError>;

    /// Drop the cached profile.
    async fn invalidate(&self, account_id: &AccountId) -> Result<(), ProfileCacheError>;
}

/// Cache that stores nothing; every read is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureProfileCache;

#[async_trait]
impl ProfileCache for FixtureProfileCache {
    async fn get(
        &self,
        _account_id: &AccountId,
    ) -> Result<Option<ProfileRecord>, ProfileCacheError> {
        Ok(None)
    }

    async fn set(&self, _profile: &ProfileRecord) -> Result<(), ProfileCacheError> {
        Ok(())
    }

    async fn invalidate(&self, _account_id: &AccountId) -> Result<(), ProfileCacheError> {
        Ok(())
    }
}
