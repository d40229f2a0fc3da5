//! Driving port for public profile reads.

use async_trait::async_trait;

use crate::domain::profile_query::ProfileQueryError;
use crate::domain::{AccountId, ProfileRecord};

/// Domain use-case port for reading a profile through the cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileQuery: Send + Sync {
    /// Return the profile for an account.
    async fn profile(&self, account_id: &AccountId) -> Result<ProfileRecord, ProfileQueryError>;
}
