//! Ledger entries and the registration outcomes they record.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use super::{IdempotencyKey, RequestFingerprint};
use crate::domain::AccountId;

/// Business rejection that is final for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The email already belongs to another account.
    DuplicateEmail,
    /// The username already belongs to another account.
    DuplicateUsername,
}

/// Terminal outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Both primary records were written.
    Registered {
        /// Account created by the attempt.
        account_id: AccountId,
        /// Creation timestamp reported to the caller.
        created_at: DateTime<Utc>,
    },
    /// The request was rejected for a uniqueness violation.
    Rejected(RejectionReason),
}

/// Per-key ledger state. Absence is modelled by the entry not existing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerState {
    /// An attempt holds the key and has not settled yet.
    InFlight,
    /// The attempt finished; the outcome never changes afterwards.
    Terminal(RegistrationOutcome),
}

/// One idempotency ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Key the entry is stored under.
    pub key: IdempotencyKey,
    /// Fingerprint of the request that claimed the key.
    pub fingerprint: RequestFingerprint,
    /// Token fencing `commit`/`release` to the attempt that claimed the key.
    pub claim_token: Uuid,
    /// Account the claiming attempt writes. Taking over an abandoned attempt
    /// keeps it, so the takeover finishes the same account.
    pub account_id: AccountId,
    /// Current state.
    pub state: LedgerState,
    /// When the claiming attempt started.
    pub started_at: DateTime<Utc>,
    /// When the entry stops counting; afterwards it behaves as absent.
    pub expires_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build a fresh in-flight entry with a random claim token and a new
    /// account id.
    pub fn in_flight(
        key: IdempotencyKey,
        fingerprint: RequestFingerprint,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            key,
            fingerprint,
            claim_token: Uuid::new_v4(),
            account_id: AccountId::random(),
            state: LedgerState::InFlight,
            started_at: now,
            expires_at: add_saturating(now, ttl),
        }
    }

    /// Keep writing `account_id` instead of the freshly generated one.
    #[must_use]
    pub fn resuming(mut self, account_id: AccountId) -> Self {
        self.account_id = account_id;
        self
    }

    /// Whether the retention window has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether an in-flight marker outlived its lease.
    pub fn is_abandoned(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        matches!(self.state, LedgerState::InFlight) && add_saturating(self.started_at, lease) <= now
    }

    /// Whether `begin` may overwrite this entry.
    pub fn is_claimable(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        self.is_expired(now) || self.is_abandoned(now, lease)
    }
}

/// Result of [`crate::domain::ports::RegistrationLedger::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The caller now owns the key.
    Acquired,
    /// Another attempt holds or settled the key.
    Existing(LedgerEntry),
}

fn add_saturating(at: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(span)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
