//! Profile cache held in process memory.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::guard;
use crate::domain::ports::{ProfileCache, ProfileCacheError};
use crate::domain::{AccountId, ProfileRecord};

/// Entries kept before the oldest insertion is evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct Entries {
    profiles: HashMap<AccountId, ProfileRecord>,
    inserted: VecDeque<AccountId>,
}

impl Entries {
    fn insert(&mut self, profile: &ProfileRecord, capacity: usize) {
        if self
            .profiles
            .insert(profile.account_id, profile.clone())
            .is_none()
        {
            self.inserted.push_back(profile.account_id);
        }
        while self.profiles.len() > capacity {
            let Some(oldest) = self.inserted.pop_front() else {
                break;
            };
            self.profiles.remove(&oldest);
        }
    }

    fn remove(&mut self, account_id: &AccountId) {
        if self.profiles.remove(account_id).is_some() {
            self.inserted.retain(|id| id != account_id);
        }
    }
}

/// Bounded cache with switchable read and write outages. Once full, the
/// earliest inserted entry makes room for the next one.
#[derive(Debug)]
pub struct MemoryProfileCache {
    entries: Mutex<Entries>,
    capacity: usize,
    reads_unavailable: AtomicBool,
    writes_unavailable: AtomicBool,
}

impl Default for MemoryProfileCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl MemoryProfileCache {
    /// Create an empty cache holding [`DEFAULT_CACHE_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity: capacity.max(1),
            reads_unavailable: AtomicBool::new(false),
            writes_unavailable: AtomicBool::new(false),
        }
    }

    /// Make `get` fail with a backend error.
    pub fn set_reads_unavailable(&self, unavailable: bool) {
        self.reads_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `set` and `invalidate` fail with a backend error.
    pub fn set_writes_unavailable(&self, unavailable: bool) {
        self.writes_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Peek at an entry without going through the port.
    pub fn cached(&self, account_id: &AccountId) -> Option<ProfileRecord> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.profiles.get(account_id).cloned())
    }

    /// Number of cached profiles.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.profiles.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writes(&self) -> Result<(), ProfileCacheError> {
        if self.writes_unavailable.load(Ordering::SeqCst) {
            return Err(ProfileCacheError::backend("cache is read-only"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileCache for MemoryProfileCache {
    async fn get(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ProfileRecord>, ProfileCacheError> {
        if self.reads_unavailable.load(Ordering::SeqCst) {
            return Err(ProfileCacheError::backend("cache is offline"));
        }
        let entries = guard(&self.entries, ProfileCacheError::backend)?;
        Ok(entries.profiles.get(account_id).cloned())
    }

    async fn set(&self, profile: &ProfileRecord) -> Result<(), ProfileCacheError> {
        self.check_writes()?;
        let mut entries = guard(&self.entries, ProfileCacheError::backend)?;
        entries.insert(profile, self.capacity);
        Ok(())
    }

    async fn invalidate(&self, account_id: &AccountId) -> Result<(), ProfileCacheError> {
        self.check_writes()?;
        let mut entries = guard(&self.entries, ProfileCacheError::backend)?;
        entries.remove(account_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;

    use super::*;
    use crate::domain::{DisplayAttributes, Username};

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
    async fn full_cache_evicts_the_earliest_insertion() {
        let cache = MemoryProfileCache::with_capacity(2);
        let (ada, bob, cy) = (profile("ada"), profile("bob"), profile("cyd"));
        for entry in [&ada, &bob, &cy] {
            cache.set(entry).await.expect("set");
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.cached(&ada.account_id).is_none());
        assert_eq!(cache.cached(&cy.account_id), Some(cy));
    }

    #[rstest]
    #[tokio::test]
    async fn overwriting_an_entry_does_not_use_more_room() {
        let cache = MemoryProfileCache::with_capacity(2);
        let (ada, bob) = (profile("ada"), profile("bob"));
        cache.set(&ada).await.expect("set");
        cache.set(&bob).await.expect("set");
        cache.set(&ada).await.expect("overwrite");

        assert_eq!(cache.len(), 2);
        assert!(cache.cached(&bob.account_id).is_some());
    }

    #[rstest]
    #[tokio::test]
    async fn invalidated_entries_free_their_slot() {
        let cache = MemoryProfileCache::with_capacity(2);
        let (ada, bob, cy) = (profile("ada"), profile("bob"), profile("cyd"));
        cache.set(&ada).await.expect("set");
        cache.set(&bob).await.expect("set");
        cache.invalidate(&ada.account_id).await.expect("invalidate");
        cache.set(&cy).await.expect("set");

        assert_eq!(cache.len(), 2);
        assert!(cache.cached(&bob.account_id).is_some());
        assert!(cache.cached(&cy.account_id).is_some());
    }
}
