//! Redis-backed `ProfileCache` adapter.
//!
//! Entries are JSON documents under `profile:v1:<account_id>`. Every write
//! sets a TTL with a random extra so entries written together do not expire
//! together.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use bb8_redis::redis::AsyncCommands;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::ports::{ProfileCache, ProfileCacheError};
use crate::domain::{AccountId, DisplayAttributes, ProfileRecord, Username};

const KEY_PREFIX: &str = "profile:v1:";

/// Cache key for an account's profile.
pub fn profile_key(account_id: &AccountId) -> String {
    format!("{KEY_PREFIX}{account_id}")
}

/// Expiry applied to cache writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    base: Duration,
    max_jitter: Duration,
}

impl CacheTtl {
    /// Expire after `base` plus up to a tenth of `base`.
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max_jitter: base / 10,
        }
    }

    /// Whole seconds for the next write; never zero.
    pub fn next_secs(&self) -> u64 {
        let jitter = self.max_jitter.as_secs();
        let extra = if jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter)
        };
        self.base.as_secs().saturating_add(extra).max(1)
    }
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

/// Wire form of a cached profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedProfile {
    account_id: Uuid,
    username: String,
    #[serde(default)]
    display_attributes: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

impl From<&ProfileRecord> for CachedProfile {
    fn from(profile: &ProfileRecord) -> Self {
        Self {
            account_id: *profile.account_id.as_uuid(),
            username: profile.username.as_str().to_owned(),
            display_attributes: profile.display_attributes.as_map().clone(),
            created_at: profile.created_at,
        }
    }
}

impl TryFrom<CachedProfile> for ProfileRecord {
    type Error = ProfileCacheError;

    fn try_from(cached: CachedProfile) -> Result<Self, Self::Error> {
        let username = Username::new(&cached.username)
            .map_err(|err| ProfileCacheError::serialization(err.to_string()))?;
        let display_attributes = DisplayAttributes::new(cached.display_attributes)
            .map_err(|err| ProfileCacheError::serialization(err.to_string()))?;
        Ok(Self {
            account_id: AccountId::from_uuid(cached.account_id),
            username,
            display_attributes,
            created_at: cached.created_at,
        })
    }
}

fn encode(profile: &ProfileRecord) -> Result<String, ProfileCacheError> {
    serde_json::to_string(&CachedProfile::from(profile))
        .map_err(|err| ProfileCacheError::serialization(err.to_string()))
}

fn decode(payload: &str) -> Result<ProfileRecord, ProfileCacheError> {
    let cached: CachedProfile = serde_json::from_str(payload)
        .map_err(|err| ProfileCacheError::serialization(err.to_string()))?;
    ProfileRecord::try_from(cached)
}

/// Profile cache stored in Redis.
#[derive(Clone)]
pub struct RedisProfileCache {
    pool: Pool<RedisConnectionManager>,
    ttl: CacheTtl,
}

impl RedisProfileCache {
    /// Build a pool for `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileCacheError::Backend`] for an invalid URL or when the
    /// pool cannot be built.
    pub async fn connect(
        redis_url: &str,
        ttl: CacheTtl,
        checkout_timeout: Duration,
    ) -> Result<Self, ProfileCacheError> {
        let manager = RedisConnectionManager::new(redis_url)
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        let pool = Pool::builder()
            .max_size(8)
            .connection_timeout(checkout_timeout)
            .build(manager)
            .await
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        Ok(Self { pool, ttl })
    }
}

#[async_trait]
impl ProfileCache for RedisProfileCache {
    #[instrument(skip_all, fields(account_id = %account_id), err)]
    async fn get(&self, account_id: &AccountId) -> Result<Option<ProfileRecord>, ProfileCacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        let payload: Option<String> = conn
            .get(profile_key(account_id))
            .await
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        payload.as_deref().map(decode).transpose()
    }

    #[instrument(skip_all, fields(account_id = %profile.account_id), err)]
    async fn set(&self, profile: &ProfileRecord) -> Result<(), ProfileCacheError> {
        let payload = encode(profile)?;
        let ttl_secs = self.ttl.next_secs();
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        let () = conn
            .set_ex(profile_key(&profile.account_id), payload, ttl_secs)
            .await
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        debug!(ttl_secs, "profile cached");
        Ok(())
    }

    #[instrument(skip_all, fields(account_id = %account_id), err)]
    async fn invalidate(&self, account_id: &AccountId) -> Result<(), ProfileCacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        let () = conn
            .del(profile_key(account_id))
            .await
            .map_err(|err| ProfileCacheError::backend(err.to_string()))?;
        Ok(())
    }
}
