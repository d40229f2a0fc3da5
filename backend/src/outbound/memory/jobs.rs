//! Job queue that keeps accepted jobs for inspection.
//!
//! Nothing consumes these jobs. The queue keeps the most recent
//! [`DEFAULT_QUEUE_CAPACITY`] and drops the oldest beyond that.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::guard;
use crate::domain::JobDescriptor;
use crate::domain::ports::{JobDispatchError, JobQueue};

/// Jobs retained before the oldest is dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct MemoryJobQueue {
    jobs: Mutex<VecDeque<JobDescriptor>>,
    capacity: usize,
    unavailable: AtomicBool,
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` jobs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make `enqueue` fail as if the broker were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Jobs retained so far, oldest first.
    pub fn jobs(&self) -> Vec<JobDescriptor> {
        self.jobs
            .lock()
            .map(|jobs| jobs.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: &JobDescriptor) -> Result<(), JobDispatchError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(JobDispatchError::unavailable("queue is offline"));
        }
        let mut jobs = guard(&self.jobs, JobDispatchError::rejected)?;
        if jobs.len() >= self.capacity {
            if let Some(dropped) = jobs.pop_front() {
                warn!(
                    job_type = %dropped.job_type,
                    account_id = %dropped.account_id,
                    "in-memory job queue full; dropping oldest job"
                );
            }
        }
        jobs.push_back(job.clone());
        debug!(job_type = %job.job_type, account_id = %job.account_id, "job queued in memory");
        Ok(())
    }
}
