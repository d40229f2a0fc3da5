//! PostgreSQL outbox implementing the `JobQueue` port.
//!
//! Jobs are appended to `queued_jobs`; external workers drain the table and
//! acknowledge by deleting rows. Delivery is therefore at least once.

use async_trait::async_trait;
use diesel_async::RunQueryDsl;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::JobDescriptor;
use crate::domain::ports::{JobDispatchError, JobQueue};

use super::error_mapping::{map_basic_diesel_error, map_pool_error};
use super::models::NewQueuedJobRow;
use super::pool::DbPool;
use super::schema::queued_jobs;

/// Diesel-backed outbox for side-effect jobs.
#[derive(Clone)]
pub struct DieselJobOutbox {
    pool: DbPool,
}

impl DieselJobOutbox {
    /// Create a new outbox with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for DieselJobOutbox {
    #[instrument(skip_all, fields(job_type = %job.job_type, account_id = %job.account_id))]
    async fn enqueue(&self, job: &JobDescriptor) -> Result<(), JobDispatchError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_pool_error(err, JobDispatchError::unavailable))?;

        let row = NewQueuedJobRow {
            id: Uuid::new_v4(),
            job_type: job.job_type.as_str(),
            account_id: *job.account_id.as_uuid(),
            payload: &job.payload,
            enqueued_at: job.enqueued_at,
        };
        diesel::insert_into(queued_jobs::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(|err| {
                map_basic_diesel_error(err, JobDispatchError::rejected, JobDispatchError::unavailable)
            })?;
        debug!(job_id = %row.id, "job written to outbox");
        Ok(())
    }
}
