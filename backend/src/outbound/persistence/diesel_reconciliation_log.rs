//! PostgreSQL-backed `ReconciliationLog` implementation using Diesel ORM.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{
    FlagReason, ReconciliationFlag, ReconciliationLog, ReconciliationLogError,
};
use crate::domain::{AccountId, EmailAddress};

use super::error_mapping::{map_basic_diesel_error, map_pool_error};
use super::models::ReconciliationFlagRow;
use super::pool::DbPool;
use super::schema::reconciliation_flags;

/// Diesel-backed implementation of the `ReconciliationLog` port.
#[derive(Clone)]
pub struct DieselReconciliationLog {
    pool: DbPool,
}

impl DieselReconciliationLog {
    /// Create a new log with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> ReconciliationLogError {
    map_basic_diesel_error(
        error,
        ReconciliationLogError::query,
        ReconciliationLogError::connection,
    )
}

fn row_to_flag(row: ReconciliationFlagRow) -> Result<ReconciliationFlag, ReconciliationLogError> {
    let email = EmailAddress::new(&row.email).map_err(|err| {
        ReconciliationLogError::corrupt(format!("flag {}: {err}", row.account_id))
    })?;
    Ok(ReconciliationFlag {
        account_id: AccountId::from_uuid(row.account_id),
        email,
        reason: row.reason.parse()?,
        flagged_at: row.flagged_at,
    })
}

#[async_trait]
impl ReconciliationLog for DieselReconciliationLog {
    async fn record(&self, flag: &ReconciliationFlag) -> Result<(), ReconciliationLogError> {
        use reconciliation_flags::dsl as f;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, ReconciliationLogError::connection))?;

        let row = ReconciliationFlagRow {
            account_id: *flag.account_id.as_uuid(),
            email: flag.email.as_str().to_owned(),
            reason: flag.reason.as_str().to_owned(),
            flagged_at: flag.flagged_at,
        };
        diesel::insert_into(f::reconciliation_flags)
            .values(&row)
            .on_conflict(f::account_id)
            .do_update()
            .set((
                f::email.eq(excluded(f::email)),
                f::reason.eq(excluded(f::reason)),
                f::flagged_at.eq(excluded(f::flagged_at)),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn resolve(&self, account_id: &AccountId) -> Result<(), ReconciliationLogError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, ReconciliationLogError::connection))?;

        diesel::delete(reconciliation_flags::table.find(*account_id.as_uuid()))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn due(
        &self,
        pending_cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReconciliationFlag>, ReconciliationLogError> {
        use reconciliation_flags::dsl as f;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, ReconciliationLogError::connection))?;

        let rows: Vec<ReconciliationFlagRow> = f::reconciliation_flags
            .filter(
                f::reason
                    .eq(FlagReason::CompensationFailed.as_str())
                    .or(f::flagged_at.le(pending_cutoff)),
            )
            .order(f::flagged_at.asc())
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .select(ReconciliationFlagRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_flag).collect()
    }
}
