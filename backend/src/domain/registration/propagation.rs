//! Best-effort propagation to derived stores after the primary writes.

use tracing::{debug, warn};

use super::{Inner, RegisteredAccount};
use crate::domain::JobDescriptor;
use crate::domain::ports::{JobDispatchError, ProfileCacheError};
use crate::domain::retry::within;

impl Inner {
    /// Write the cache entry and enqueue side-effect jobs concurrently.
    ///
    /// Each call has its own short deadline. Failures are logged and never
    /// reach the caller.
    pub(super) async fn propagate(&self, account: &RegisteredAccount) {
        let profile = &account.profile;
        let now = self.clock.utc();
        let welcome = JobDescriptor::welcome_email(
            profile.account_id,
            &account.email,
            &profile.username,
            now,
        );
        let analytics = JobDescriptor::signup_analytics(profile.account_id, profile.created_at, now);

        let cache_limit = self.config.cache_timeout;
        let queue_limit = self.config.queue_timeout;
        let (cached, welcomed, tracked) = tokio::join!(
            within(cache_limit, self.ports.cache.set(profile), || {
                ProfileCacheError::timeout("set")
            }),
            within(queue_limit, self.ports.jobs.enqueue(&welcome), || {
                JobDispatchError::timeout(welcome.job_type.as_str())
            }),
            within(queue_limit, self.ports.jobs.enqueue(&analytics), || {
                JobDispatchError::timeout(analytics.job_type.as_str())
            }),
        );

        let account_id = profile.account_id;
        if let Err(err) = cached {
            warn!(account_id = %account_id, error = %err, "profile cache write-through failed");
        }
        for (job, result) in [(&welcome, welcomed), (&analytics, tracked)] {
            match result {
                Ok(()) => debug!(account_id = %account_id, job_type = %job.job_type, "job enqueued"),
                Err(err) => warn!(
                    account_id = %account_id,
                    job_type = %job.job_type,
                    error = %err,
                    "job enqueue failed"
                ),
            }
        }
    }
}
