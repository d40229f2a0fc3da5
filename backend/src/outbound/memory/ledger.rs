//! Idempotency ledger with atomic claims under a single lock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::guard;
use crate::domain::idempotency::{
    BeginOutcome, IdempotencyKey, LedgerEntry, LedgerState, RegistrationOutcome,
};
use crate::domain::ports::{LedgerError, RegistrationLedger};

#[derive(Debug, Default)]
pub struct MemoryRegistrationLedger {
    entries: Mutex<HashMap<IdempotencyKey, LedgerEntry>>,
    commits_unavailable: AtomicBool,
}

impl MemoryRegistrationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `commit` fail as if the database connection dropped.
    pub fn set_commits_unavailable(&self, unavailable: bool) {
        self.commits_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of entries currently stored, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RegistrationLedger for MemoryRegistrationLedger {
    async fn lookup(&self, key: &IdempotencyKey) -> Result<Option<LedgerEntry>, LedgerError> {
        let entries = guard(&self.entries, LedgerError::query)?;
        Ok(entries.get(key).cloned())
    }

    async fn begin(
        &self,
        entry: &LedgerEntry,
        in_flight_lease: Duration,
    ) -> Result<BeginOutcome, LedgerError> {
        let mut entries = guard(&self.entries, LedgerError::query)?;
        match entries.get(&entry.key) {
            Some(stored) if stored.claim_token == entry.claim_token => Ok(BeginOutcome::Acquired),
            Some(stored) if !stored.is_claimable(entry.started_at, in_flight_lease) => {
                Ok(BeginOutcome::Existing(stored.clone()))
            }
            _ => {
                entries.insert(entry.key.clone(), entry.clone());
                Ok(BeginOutcome::Acquired)
            }
        }
    }

    async fn commit(
        &self,
        key: &IdempotencyKey,
        claim_token: Uuid,
        outcome: &RegistrationOutcome,
    ) -> Result<(), LedgerError> {
        if self.commits_unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::connection("ledger is offline"));
        }
        let mut entries = guard(&self.entries, LedgerError::query)?;
        match entries.get_mut(key) {
            Some(stored) if stored.claim_token == claim_token => {
                stored.state = LedgerState::Terminal(outcome.clone());
                Ok(())
            }
            _ => Err(LedgerError::claim_lost(key.as_str())),
        }
    }

    async fn release(&self, key: &IdempotencyKey, claim_token: Uuid) -> Result<(), LedgerError> {
        let mut entries = guard(&self.entries, LedgerError::query)?;
        let owned = entries.get(key).is_some_and(|stored| {
            stored.claim_token == claim_token && stored.state == LedgerState::InFlight
        });
        if owned {
            entries.remove(key);
        }
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let mut entries = guard(&self.entries, LedgerError::query)?;
        let before = entries.len();
        entries.retain(|_, stored| !stored.is_expired(now));
        Ok(u64::try_from(before - entries.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::idempotency::{RejectionReason, RequestFingerprint};

    const LEASE: Duration = Duration::from_secs(300);
    const TTL: Duration = Duration::from_secs(24 * 3600);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).single().expect("valid")
    }

    fn entry_at(key: &str, at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry::in_flight(
            IdempotencyKey::new(key).expect("key"),
            RequestFingerprint::of_fields(["a@x.com", "ada"]),
            at,
            TTL,
        )
    }

    #[fixture]
    fn ledger() -> MemoryRegistrationLedger {
        MemoryRegistrationLedger::new()
    }

    #[rstest]
    #[tokio::test]
    async fn only_the_first_claim_wins(ledger: MemoryRegistrationLedger) {
        let first = entry_at("k1", now());
        let second = entry_at("k1", now());
        assert_eq!(ledger.begin(&first, LEASE).await.expect("begin"), BeginOutcome::Acquired);
        assert_eq!(
            ledger.begin(&second, LEASE).await.expect("begin"),
            BeginOutcome::Existing(first)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn abandoned_in_flight_entries_can_be_taken_over(ledger: MemoryRegistrationLedger) {
        let stale = entry_at("k1", now());
        ledger.begin(&stale, LEASE).await.expect("begin");
        let later = entry_at("k1", now() + TimeDelta::minutes(6));
        assert_eq!(ledger.begin(&later, LEASE).await.expect("begin"), BeginOutcome::Acquired);

        let err = ledger
            .commit(
                &stale.key,
                stale.claim_token,
                &RegistrationOutcome::Rejected(RejectionReason::DuplicateEmail),
            )
            .await
            .expect_err("fenced");
        assert!(matches!(err, LedgerError::ClaimLost { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn terminal_entries_block_until_expiry(ledger: MemoryRegistrationLedger) {
        let first = entry_at("k1", now());
        ledger.begin(&first, LEASE).await.expect("begin");
        ledger
            .commit(
                &first.key,
                first.claim_token,
                &RegistrationOutcome::Rejected(RejectionReason::DuplicateUsername),
            )
            .await
            .expect("commit");

        let within_ttl = entry_at("k1", now() + TimeDelta::hours(1));
        assert!(matches!(
            ledger.begin(&within_ttl, LEASE).await.expect("begin"),
            BeginOutcome::Existing(_)
        ));
        let after_ttl = entry_at("k1", now() + TimeDelta::hours(25));
        assert_eq!(
            ledger.begin(&after_ttl, LEASE).await.expect("begin"),
            BeginOutcome::Acquired
        );
    }

    #[rstest]
    #[tokio::test]
    async fn release_by_a_stale_token_is_ignored(ledger: MemoryRegistrationLedger) {
        let first = entry_at("k1", now());
        ledger.begin(&first, LEASE).await.expect("begin");
        ledger.release(&first.key, Uuid::new_v4()).await.expect("release");
        assert_eq!(ledger.len(), 1);
        ledger.release(&first.key, first.claim_token).await.expect("release");
        assert!(ledger.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn purge_removes_only_expired_entries(ledger: MemoryRegistrationLedger) {
        ledger.begin(&entry_at("old", now()), LEASE).await.expect("begin");
        ledger
            .begin(&entry_at("new", now() + TimeDelta::hours(20)), LEASE)
            .await
            .expect("begin");
        let purged = ledger
            .purge_expired(now() + TimeDelta::hours(24))
            .await
            .expect("purge");
        assert_eq!(purged, 1);
        assert_eq!(ledger.len(), 1);
    }
}
