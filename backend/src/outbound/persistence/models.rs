//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements for queries and mutations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::{credentials, profiles, queued_jobs, reconciliation_flags, registration_ledger};

// ---------------------------------------------------------------------------
// Primary records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = credentials)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CredentialRow {
    pub account_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ProfileRow {
    pub account_id: Uuid,
    pub username: String,
    pub display_attributes: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Idempotency ledger
// ---------------------------------------------------------------------------

/// Stored value of `registration_ledger.state` for unfinished attempts.
pub(crate) const STATE_IN_FLIGHT: &str = "in_flight";
/// Stored value of `registration_ledger.state` for settled attempts.
pub(crate) const STATE_TERMINAL: &str = "terminal";

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = registration_ledger)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LedgerRow {
    pub idempotency_key: String,
    pub fingerprint: String,
    pub claim_token: Uuid,
    pub account_id: Uuid,
    pub state: String,
    pub outcome: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// JSON shape of `registration_ledger.outcome`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum StoredOutcome {
    Registered {
        #[serde(rename = "accountId")]
        account_id: Uuid,
        #[serde(rename = "createdAt")]
        created_at: DateTime<Utc>,
    },
    Rejected {
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Reconciliation and outbox
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = reconciliation_flags)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ReconciliationFlagRow {
    pub account_id: Uuid,
    pub email: String,
    pub reason: String,
    pub flagged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = queued_jobs)]
pub(crate) struct NewQueuedJobRow<'a> {
    pub id: Uuid,
    pub job_type: &'a str,
    pub account_id: Uuid,
    pub payload: &'a serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}
