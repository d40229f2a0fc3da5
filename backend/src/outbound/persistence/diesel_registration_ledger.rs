//! PostgreSQL-backed `RegistrationLedger` implementation using Diesel ORM.
//!
//! Claims are made with single statements so that PostgreSQL row locking
//! decides races:
//!
//! 1. `INSERT ... ON CONFLICT DO NOTHING` claims an absent key.
//! 2. A conditional `UPDATE` takes over an expired or abandoned row; the
//!    predicate is re-checked after any competing update commits, so only one
//!    caller can win.
//! 3. Otherwise the stored row is returned unchanged.
//!
//! Commit and release are fenced by `claim_token`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::AccountId;
use crate::domain::idempotency::{
    BeginOutcome, IdempotencyKey, LedgerEntry, LedgerState, RegistrationOutcome,
    RejectionReason, RequestFingerprint,
};
use crate::domain::ports::{LedgerError, RegistrationLedger};

use super::error_mapping::{map_basic_diesel_error, map_pool_error};
use super::models::{LedgerRow, STATE_IN_FLIGHT, STATE_TERMINAL, StoredOutcome};
use super::pool::DbPool;
use super::schema::registration_ledger;

/// Diesel-backed implementation of the `RegistrationLedger` port.
#[derive(Clone)]
pub struct DieselRegistrationLedger {
    pool: DbPool,
}

impl DieselRegistrationLedger {
    /// Create a new ledger with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> LedgerError {
    map_basic_diesel_error(error, LedgerError::query, LedgerError::connection)
}

fn rejection_name(reason: RejectionReason) -> &'static str {
    match reason {
        RejectionReason::DuplicateEmail => "duplicate_email",
        RejectionReason::DuplicateUsername => "duplicate_username",
    }
}

fn outcome_to_json(outcome: &RegistrationOutcome) -> Result<serde_json::Value, LedgerError> {
    let stored = match outcome {
        RegistrationOutcome::Registered {
            account_id,
            created_at,
        } => StoredOutcome::Registered {
            account_id: *account_id.as_uuid(),
            created_at: *created_at,
        },
        RegistrationOutcome::Rejected(reason) => StoredOutcome::Rejected {
            reason: rejection_name(*reason).to_owned(),
        },
    };
    serde_json::to_value(stored).map_err(|err| LedgerError::query(format!("encode outcome: {err}")))
}

fn json_to_outcome(key: &str, value: serde_json::Value) -> Result<RegistrationOutcome, LedgerError> {
    let stored: StoredOutcome =
        serde_json::from_value(value).map_err(|err| LedgerError::corrupt(key, err.to_string()))?;
    match stored {
        StoredOutcome::Registered {
            account_id,
            created_at,
        } => Ok(RegistrationOutcome::Registered {
            account_id: AccountId::from_uuid(account_id),
            created_at,
        }),
        StoredOutcome::Rejected { reason } => match reason.as_str() {
            "duplicate_email" => Ok(RegistrationOutcome::Rejected(RejectionReason::DuplicateEmail)),
            "duplicate_username" => Ok(RegistrationOutcome::Rejected(
                RejectionReason::DuplicateUsername,
            )),
            other => Err(LedgerError::corrupt(key, format!("unknown rejection {other}"))),
        },
    }
}

fn entry_to_row(entry: &LedgerEntry) -> Result<LedgerRow, LedgerError> {
    let (state, outcome) = match &entry.state {
        LedgerState::InFlight => (STATE_IN_FLIGHT, None),
        LedgerState::Terminal(outcome) => (STATE_TERMINAL, Some(outcome_to_json(outcome)?)),
    };
    Ok(LedgerRow {
        idempotency_key: entry.key.as_str().to_owned(),
        fingerprint: entry.fingerprint.to_hex(),
        claim_token: entry.claim_token,
        account_id: *entry.account_id.as_uuid(),
        state: state.to_owned(),
        outcome,
        started_at: entry.started_at,
        expires_at: entry.expires_at,
    })
}

fn row_to_entry(row: LedgerRow) -> Result<LedgerEntry, LedgerError> {
    let key_name = row.idempotency_key.clone();
    let key = IdempotencyKey::new(row.idempotency_key)
        .map_err(|err| LedgerError::corrupt(&key_name, err.to_string()))?;
    let fingerprint = RequestFingerprint::from_hex(row.fingerprint.trim())
        .map_err(|err| LedgerError::corrupt(&key_name, err.to_string()))?;
    let state = match (row.state.as_str(), row.outcome) {
        (STATE_IN_FLIGHT, None) => LedgerState::InFlight,
        (STATE_TERMINAL, Some(outcome)) => LedgerState::Terminal(json_to_outcome(&key_name, outcome)?),
        (other, _) => {
            return Err(LedgerError::corrupt(
                &key_name,
                format!("inconsistent state {other}"),
            ));
        }
    };
    Ok(LedgerEntry {
        key,
        fingerprint,
        claim_token: row.claim_token,
        account_id: AccountId::from_uuid(row.account_id),
        state,
        started_at: row.started_at,
        expires_at: row.expires_at,
    })
}

fn lease_cutoff(started_at: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(lease)
        .ok()
        .and_then(|lease| started_at.checked_sub_signed(lease))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl RegistrationLedger for DieselRegistrationLedger {
    async fn lookup(&self, key: &IdempotencyKey) -> Result<Option<LedgerEntry>, LedgerError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, LedgerError::connection))?;

        let row: Option<LedgerRow> = registration_ledger::table
            .find(key.as_str())
            .select(LedgerRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_entry).transpose()
    }

    #[instrument(skip_all, fields(idempotency_key = %entry.key))]
    async fn begin(
        &self,
        entry: &LedgerEntry,
        in_flight_lease: Duration,
    ) -> Result<BeginOutcome, LedgerError> {
        use registration_ledger::dsl as l;

        let row = entry_to_row(entry)?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, LedgerError::connection))?;

        let inserted = diesel::insert_into(l::registration_ledger)
            .values(&row)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if inserted == 1 {
            return Ok(BeginOutcome::Acquired);
        }

        let cutoff = lease_cutoff(entry.started_at, in_flight_lease);
        let taken_over = diesel::update(
            l::registration_ledger
                .filter(l::idempotency_key.eq(row.idempotency_key.as_str()))
                .filter(
                    l::expires_at
                        .le(entry.started_at)
                        .or(l::state.eq(STATE_IN_FLIGHT).and(l::started_at.le(cutoff)))
                        .or(l::claim_token.eq(entry.claim_token)),
                ),
        )
        .set((
            l::fingerprint.eq(row.fingerprint.as_str()),
            l::claim_token.eq(row.claim_token),
            l::account_id.eq(row.account_id),
            l::state.eq(STATE_IN_FLIGHT),
            l::outcome.eq(None::<serde_json::Value>),
            l::started_at.eq(row.started_at),
            l::expires_at.eq(row.expires_at),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        if taken_over == 1 {
            debug!("took over expired or abandoned ledger entry");
            return Ok(BeginOutcome::Acquired);
        }

        let stored: Option<LedgerRow> = l::registration_ledger
            .find(row.idempotency_key.as_str())
            .select(LedgerRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        match stored {
            Some(stored) => Ok(BeginOutcome::Existing(row_to_entry(stored)?)),
            // Purged between statements; the caller's retry will insert.
            None => Err(LedgerError::query("ledger entry vanished during claim")),
        }
    }

    #[instrument(skip_all, fields(idempotency_key = %key))]
    async fn commit(
        &self,
        key: &IdempotencyKey,
        claim_token: Uuid,
        outcome: &RegistrationOutcome,
    ) -> Result<(), LedgerError> {
        use registration_ledger::dsl as l;

        let outcome = outcome_to_json(outcome)?;
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, LedgerError::connection))?;

        let updated = diesel::update(
            l::registration_ledger
                .filter(l::idempotency_key.eq(key.as_str()))
                .filter(l::claim_token.eq(claim_token)),
        )
        .set((l::state.eq(STATE_TERMINAL), l::outcome.eq(Some(outcome))))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        if updated == 0 {
            return Err(LedgerError::claim_lost(key.as_str()));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(idempotency_key = %key))]
    async fn release(&self, key: &IdempotencyKey, claim_token: Uuid) -> Result<(), LedgerError> {
        use registration_ledger::dsl as l;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, LedgerError::connection))?;

        diesel::delete(
            l::registration_ledger
                .filter(l::idempotency_key.eq(key.as_str()))
                .filter(l::claim_token.eq(claim_token))
                .filter(l::state.eq(STATE_IN_FLIGHT)),
        )
        .execute(&mut conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, LedgerError::connection))?;

        let deleted = diesel::delete(
            registration_ledger::table.filter(registration_ledger::expires_at.le(now)),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;

        debug!(deleted, cutoff = %now, "purged expired ledger entries");
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    fn entry(state: LedgerState) -> LedgerEntry {
        let mut entry = LedgerEntry::in_flight(
            IdempotencyKey::new("k1").expect("key"),
            RequestFingerprint::of_fields(["a@x.com", "ada"]),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid"),
            Duration::from_secs(3600),
        );
        entry.state = state;
        entry
    }

    #[rstest]
    #[case::in_flight(LedgerState::InFlight)]
    #[case::registered(LedgerState::Terminal(RegistrationOutcome::Registered {
        account_id: AccountId::random(),
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).single().expect("valid"),
    }))]
    #[case::rejected(LedgerState::Terminal(RegistrationOutcome::Rejected(
        RejectionReason::DuplicateUsername
    )))]
    fn rows_preserve_every_state(#[case] state: LedgerState) {
        let original = entry(state);
        let row = entry_to_row(&original).expect("row");
        assert_eq!(row_to_entry(row).expect("entry"), original);
    }

    #[rstest]
    fn terminal_rows_without_outcome_are_corrupt() {
        let mut row = entry_to_row(&entry(LedgerState::InFlight)).expect("row");
        row.state = STATE_TERMINAL.to_owned();
        assert!(matches!(row_to_entry(row), Err(LedgerError::Corrupt { .. })));
    }

    #[rstest]
    fn unknown_rejection_reason_is_corrupt() {
        let value = serde_json::json!({"status": "rejected", "reason": "banned"});
        assert!(matches!(
            json_to_outcome("k1", value),
            Err(LedgerError::Corrupt { .. })
        ));
    }

    #[rstest]
    fn lease_cutoff_saturates_for_huge_leases() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid");
        assert_eq!(lease_cutoff(now, Duration::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            lease_cutoff(now, Duration::from_secs(60)),
            now - TimeDelta::seconds(60)
        );
    }
}
