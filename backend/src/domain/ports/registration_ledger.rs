//! Port abstraction for the registration idempotency ledger.
//!
//! The ledger records one entry per [`IdempotencyKey`] and drives the state
//! machine `absent -> in-flight -> terminal`. `begin` must be atomic with
//! respect to concurrent callers: exactly one of them acquires the key.
//! Settling calls are fenced by the claim token so an attempt whose lease was
//! taken over cannot overwrite its successor.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::idempotency::{
    BeginOutcome, IdempotencyKey, LedgerEntry, RegistrationOutcome,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by ledger adapters.
    pub enum LedgerError {
        /// Store connection could not be established.
        Connection { message: String } => "registration ledger connection failed: {message}" => retryable,
        /// The call did not finish within its deadline.
        Timeout { operation: String } => "registration ledger {operation} timed out" => retryable,
        /// Query or mutation failed during execution.
        Query { message: String } => "registration ledger query failed: {message}" => retryable,
        /// A stored entry could not be decoded.
        Corrupt { key: String, message: String } => "registration ledger entry {key} is corrupt: {message}",
        /// The claim token no longer owns the key.
        ClaimLost { key: String } => "registration ledger claim on {key} was lost",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrationLedger: Send + Sync {
    /// Fetch the entry stored for `key`, expired or not.
    async fn lookup(&self, key: &IdempotencyKey) -> Result<Option<LedgerEntry>, LedgerError>;

    /// Atomically claim `entry.key` with the supplied in-flight entry.
    ///
    /// Succeeds with [`BeginOutcome::Acquired`] when the key is absent, when
    /// the stored entry has expired at `entry.started_at`, or when the stored
    /// in-flight marker is older than `in_flight_lease`. Otherwise returns the
    /// stored entry unchanged.
    async fn begin(
        &self,
        entry: &LedgerEntry,
        in_flight_lease: Duration,
    ) -> Result<BeginOutcome, LedgerError>;

    /// Record the terminal outcome for a key still held by `claim_token`.
    async fn commit(
        &self,
        key: &IdempotencyKey,
        claim_token: Uuid,
        outcome: &RegistrationOutcome,
    ) -> Result<(), LedgerError>;

    /// Drop an in-flight marker still held by `claim_token` so the key can be
    /// retried. Releasing a key held by another token is a no-op.
    async fn release(&self, key: &IdempotencyKey, claim_token: Uuid) -> Result<(), LedgerError>;

    /// Delete entries whose retention window ended before `now`.
    ///
    /// Returns the number of entries removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, LedgerError>;
}
