//! Read-through profile queries.
//!
//! The cache is consulted first under a short deadline. Misses and cache
//! failures fall back to the profile store, whose answer overwrites the cache
//! entry. The cache is never authoritative.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::domain::ports::{
    ProfileCache, ProfileCacheError, ProfileQuery, ProfileStore, ProfileStoreError,
};
use crate::domain::retry::{Retrier, RetryDisposition, RetryPolicy, RetryRuntime, within};
use crate::domain::{AccountId, ProfileRecord};

/// Failure returned by [`ProfileQueryService::profile`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileQueryError {
    /// No profile exists for the account.
    #[error("profile {account_id} not found")]
    NotFound {
        /// Account that was looked up.
        account_id: AccountId,
    },
    /// The profile store stayed unavailable after retries.
    #[error("profile store unavailable: {message}")]
    StoreUnavailable {
        /// Diagnostic detail; never shown to clients.
        message: String,
    },
}

/// Deadlines and retry bounds for profile reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileQueryConfig {
    pub retry: RetryPolicy,
    pub store_timeout: Duration,
    pub cache_timeout: Duration,
}

impl Default for ProfileQueryConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            store_timeout: Duration::from_secs(2),
            cache_timeout: Duration::from_millis(250),
        }
    }
}

/// Serves profile reads from the cache, falling back to the profile store.
#[derive(Clone)]
pub struct ProfileQueryService {
    profiles: Arc<dyn ProfileStore>,
    cache: Arc<dyn ProfileCache>,
    retrier: Retrier,
    config: ProfileQueryConfig,
}

impl ProfileQueryService {
    /// Build the service.
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        cache: Arc<dyn ProfileCache>,
        clock: Arc<dyn Clock>,
        config: ProfileQueryConfig,
    ) -> Self {
        Self::with_runtime(profiles, cache, clock, config, RetryRuntime::default())
    }

    /// Build the service with explicit retry runtime helpers.
    pub fn with_runtime(
        profiles: Arc<dyn ProfileStore>,
        cache: Arc<dyn ProfileCache>,
        clock: Arc<dyn Clock>,
        config: ProfileQueryConfig,
        runtime: RetryRuntime,
    ) -> Self {
        Self {
            profiles,
            cache,
            retrier: Retrier::new(config.retry, runtime, clock),
            config,
        }
    }

    /// Return the profile for `account_id`.
    #[instrument(name = "profile.read", skip_all, fields(account_id = %account_id))]
    pub async fn profile(&self, account_id: &AccountId) -> Result<ProfileRecord, ProfileQueryError> {
        let cached = within(self.config.cache_timeout, self.cache.get(account_id), || {
            ProfileCacheError::timeout("get")
        })
        .await;
        match cached {
            Ok(Some(profile)) => {
                debug!("profile cache hit");
                return Ok(profile);
            }
            Ok(None) => debug!("profile cache miss"),
            Err(err) => warn!(error = %err, "profile cache read failed; reading the store"),
        }
        self.refresh(account_id).await
    }

    /// Read the profile store and overwrite the cache entry.
    pub async fn refresh(&self, account_id: &AccountId) -> Result<ProfileRecord, ProfileQueryError> {
        let store = &self.profiles;
        let limit = self.config.store_timeout;
        let found = self
            .retrier
            .run(
                "profile.find_by_account",
                || within(limit, store.find_by_account(account_id), || {
                    ProfileStoreError::timeout("find_by_account")
                }),
                |err: &ProfileStoreError| RetryDisposition::from_retryable(err.is_retryable()),
            )
            .await
            .map_err(|err| ProfileQueryError::StoreUnavailable {
                message: err.to_string(),
            })?;

        let Some(profile) = found else {
            return Err(ProfileQueryError::NotFound {
                account_id: *account_id,
            });
        };

        let written = within(self.config.cache_timeout, self.cache.set(&profile), || {
            ProfileCacheError::timeout("set")
        })
        .await;
        if let Err(err) = written {
            warn!(error = %err, "profile cache repopulation failed");
        }
        Ok(profile)
    }
}

#[async_trait]
impl ProfileQuery for ProfileQueryService {
    async fn profile(&self, account_id: &AccountId) -> Result<ProfileRecord, ProfileQueryError> {
        Self::profile(self, account_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use mockall::predicate::eq;
    use rstest::rstest;

    use super::*;
    use crate::domain::ports::{MockProfileCache, MockProfileStore};
    use crate::domain::{DisplayAttributes, Username};
    use crate::test_support::{ImmediateSleeper, NoJitter};

    fn profile() -> ProfileRecord {
        ProfileRecord {
            account_id: AccountId::random(),
            username: Username::new("ada").expect("username"),
            display_attributes: DisplayAttributes::new(BTreeMap::new()).expect("attributes"),
            created_at: Utc::now(),
        }
    }

    fn service(store: MockProfileStore, cache: MockProfileCache) -> ProfileQueryService {
        ProfileQueryService::with_runtime(
            Arc::new(store),
            Arc::new(cache),
            Arc::new(mockable::DefaultClock),
            ProfileQueryConfig::default(),
            RetryRuntime {
                sleeper: Arc::new(ImmediateSleeper),
                jitter: Arc::new(NoJitter),
            },
        )
    }

    #[rstest]
    #[tokio::test]
    async fn cache_hit_skips_the_store() {
        let expected = profile();
        let mut cache = MockProfileCache::new();
        let hit = expected.clone();
        cache
            .expect_get()
            .with(eq(expected.account_id))
            .return_once(move |_| Ok(Some(hit)));
        let mut store = MockProfileStore::new();
        store.expect_find_by_account().never();

        let found = service(store, cache)
            .profile(&expected.account_id)
            .await
            .expect("profile");
        assert_eq!(found, expected);
    }

    #[rstest]
    #[tokio::test]
    async fn cache_failure_reads_store_and_repopulates() {
        let expected = profile();
        let mut cache = MockProfileCache::new();
        cache
            .expect_get()
            .return_once(|_| Err(ProfileCacheError::backend("connection reset")));
        cache
            .expect_set()
            .withf({
                let expected = expected.clone();
                move |written| *written == expected
            })
            .times(1)
            .return_once(|_| Ok(()));
        let mut store = MockProfileStore::new();
        let stored = expected.clone();
        store
            .expect_find_by_account()
            .return_once(move |_| Ok(Some(stored)));

        let found = service(store, cache)
            .profile(&expected.account_id)
            .await
            .expect("profile");
        assert_eq!(found, expected);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let id = AccountId::random();
        let mut cache = MockProfileCache::new();
        cache.expect_get().return_once(|_| Ok(None));
        cache.expect_set().never();
        let mut store = MockProfileStore::new();
        store.expect_find_by_account().return_once(|_| Ok(None));

        let err = service(store, cache).profile(&id).await.expect_err("missing");
        assert_eq!(err, ProfileQueryError::NotFound { account_id: id });
    }

    #[rstest]
    #[tokio::test]
    async fn store_outage_is_retried_then_unavailable() {
        let mut cache = MockProfileCache::new();
        cache.expect_get().return_once(|_| Ok(None));
        let mut store = MockProfileStore::new();
        store
            .expect_find_by_account()
            .times(3)
            .returning(|_| Err(ProfileStoreError::connection("refused")));

        let err = service(store, cache)
            .profile(&AccountId::random())
            .await
            .expect_err("unavailable");
        assert!(matches!(err, ProfileQueryError::StoreUnavailable { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn cache_write_failure_does_not_fail_the_read() {
        let expected = profile();
        let mut cache = MockProfileCache::new();
        cache.expect_get().return_once(|_| Ok(None));
        cache
            .expect_set()
            .return_once(|_| Err(ProfileCacheError::backend("read-only replica")));
        let mut store = MockProfileStore::new();
        let stored = expected.clone();
        store
            .expect_find_by_account()
            .return_once(move |_| Ok(Some(stored)));

        let found = service(store, cache)
            .profile(&expected.account_id)
            .await
            .expect("profile");
        assert_eq!(found, expected);
    }
}
