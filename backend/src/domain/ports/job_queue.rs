//! Domain port describing dispatch of asynchronous side-effect jobs.
use async_trait::async_trait;

use crate::domain::JobDescriptor;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by the queue/dispatcher adapter.
    pub enum JobDispatchError {
        /// Queue infrastructure is unavailable.
        Unavailable { message: String } => "job queue is unavailable: {message}" => retryable,
        /// The call did not finish within its deadline.
        Timeout { job_type: String } => "enqueue of {job_type} timed out" => retryable,
        /// The job could not be acknowledged or persisted.
        Rejected { message: String } => "job was rejected: {message}",
    }
}

/// At-least-once dispatcher. Completion of a job is never awaited.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Hand a job to the queue.
    async fn enqueue(&self, job: &JobDescriptor) -> Result<(), JobDispatchError>;
}

/// Queue that accepts and drops every job.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureJobQueue;

#[async_trait]
impl JobQueue for FixtureJobQueue {
    async fn enqueue(&self, _job: &JobDescriptor) -> Result<(), JobDispatchError> {
        Ok(())
    }
}
