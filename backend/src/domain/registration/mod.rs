//! Registration orchestrator.
//!
//! Writes the credential record and then the profile record without a
//! cross-store transaction, then propagates to the cache and the job queue on
//! a best-effort basis. Safety under retries comes from three pieces:
//!
//! 1. The idempotency ledger: one attempt per key, terminal outcomes replay.
//! 2. A reconciliation flag written before the credential, so a credential
//!    without a profile is always discoverable.
//! 3. Compensation: a failed profile write deletes the credential again.
//!
//! The primary-write section runs on its own task. Dropping the caller's
//! future therefore cannot interrupt it between the two writes.

mod error;
mod primary;
mod propagation;
mod request;


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{Instrument, Span, debug, error, field, instrument};

pub use error::{RegistrationError, RegistrationErrorKind};
pub use request::{RegistrationCommand, RegistrationReceipt, RegistrationRequest};

use crate::domain::idempotency::{
    BeginOutcome, IdempotencyConfig, LedgerEntry, LedgerState, RegistrationOutcome,
    RejectionReason,
};
use crate::domain::ports::{
    AccountRegistration, CredentialStore, JobQueue, LedgerError, PasswordHasher, ProfileCache,
    ProfileStore, ReconciliationLog, RegistrationLedger,
};
use crate::domain::retry::{Retrier, RetryDisposition, RetryPolicy, RetryRuntime, within};
use crate::domain::{EmailAddress, ProfileRecord};

/// Driven ports used by the orchestrator.
#[derive(Clone)]
pub struct RegistrationPorts {
    pub credentials: Arc<dyn CredentialStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub cache: Arc<dyn ProfileCache>,
    pub jobs: Arc<dyn JobQueue>,
    pub ledger: Arc<dyn RegistrationLedger>,
    pub reconciliation: Arc<dyn ReconciliationLog>,
    pub hasher: Arc<dyn PasswordHasher>,
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationConfig {
    /// Retry bounds for store calls.
    pub retry: RetryPolicy,
    /// Deadline for each individual store call.
    pub store_timeout: Duration,
    /// Deadline for each cache call.
    pub cache_timeout: Duration,
    /// Deadline for each enqueue.
    pub queue_timeout: Duration,
    /// Ledger retention and in-flight lease.
    pub idempotency: IdempotencyConfig,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            store_timeout: Duration::from_secs(2),
            cache_timeout: Duration::from_millis(250),
            queue_timeout: Duration::from_millis(250),
            idempotency: IdempotencyConfig::default(),
        }
    }
}

/// Primary records written by a successful attempt.
#[derive(Debug, Clone)]
struct RegisteredAccount {
    email: EmailAddress,
    profile: ProfileRecord,
}

enum Claim {
    Acquired(LedgerEntry),
    Replay(RegistrationOutcome),
}

struct Inner {
    ports: RegistrationPorts,
    clock: Arc<dyn Clock>,
    retrier: Retrier,
    config: RegistrationConfig,
}

/// Orchestrates the register-user use case.
#[derive(Clone)]
pub struct RegistrationService {
    inner: Arc<Inner>,
}

impl RegistrationService {
    /// Build a service with Tokio sleeping and random jitter.
    pub fn new(ports: RegistrationPorts, clock: Arc<dyn Clock>, config: RegistrationConfig) -> Self {
        Self::with_runtime(ports, clock, config, RetryRuntime::default())
    }

    /// Build a service with explicit retry runtime helpers.
    pub fn with_runtime(
        ports: RegistrationPorts,
        clock: Arc<dyn Clock>,
        config: RegistrationConfig,
        runtime: RetryRuntime,
    ) -> Self {
        let retrier = Retrier::new(config.retry, runtime, Arc::clone(&clock));
        Self {
            inner: Arc::new(Inner {
                ports,
                clock,
                retrier,
                config,
            }),
        }
    }

    /// Register a new account.
    ///
    /// Terminal outcomes recorded under the request's idempotency key are
    /// replayed without touching any store: a success comes back with
    /// `replayed = true`, a rejection comes back as the same error.
    #[instrument(
        name = "registration.register",
        skip_all,
        fields(idempotency_key = field::Empty, account_id = field::Empty)
    )]
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, RegistrationError> {
        let command = RegistrationCommand::try_from(request)?;
        Span::current().record("idempotency_key", command.key.as_str());

        let entry = match self.inner.claim(&command).await? {
            Claim::Replay(outcome) => {
                debug!("replaying settled registration");
                return replay(outcome);
            }
            Claim::Acquired(entry) => entry,
        };

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(
            async move { inner.execute_claimed(command, entry).await }.in_current_span(),
        );
        let account = handle.await.map_err(|err| {
            error!(error = %err, "registration task did not complete");
            RegistrationError::unknown(format!("registration task failed: {err}"))
        })??;
        Span::current().record("account_id", field::display(account.profile.account_id));

        self.inner.propagate(&account).await;

        Ok(RegistrationReceipt {
            account_id: account.profile.account_id,
            created_at: account.profile.created_at,
            replayed: false,
        })
    }
}

#[async_trait]
impl AccountRegistration for RegistrationService {
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, RegistrationError> {
        Self::register(self, request).await
    }
}

fn replay(outcome: RegistrationOutcome) -> Result<RegistrationReceipt, RegistrationError> {
    match outcome {
        RegistrationOutcome::Registered {
            account_id,
            created_at,
        } => Ok(RegistrationReceipt {
            account_id,
            created_at,
            replayed: true,
        }),
        RegistrationOutcome::Rejected(RejectionReason::DuplicateEmail) => {
            Err(RegistrationError::DuplicateEmail)
        }
        RegistrationOutcome::Rejected(RejectionReason::DuplicateUsername) => {
            Err(RegistrationError::DuplicateUsername)
        }
    }
}

fn ledger_disposition(error: &LedgerError) -> RetryDisposition {
    RetryDisposition::from_retryable(error.is_retryable())
}

fn map_ledger_error(error: LedgerError) -> RegistrationError {
    if error.is_retryable() {
        RegistrationError::store_unavailable(error.to_string())
    } else {
        RegistrationError::unknown(error.to_string())
    }
}

impl Inner {
    /// Decide whether this attempt may run, replays, or conflicts.
    async fn claim(&self, command: &RegistrationCommand) -> Result<Claim, RegistrationError> {
        let ledger = &self.ports.ledger;
        let limit = self.config.store_timeout;
        let now = self.clock.utc();
        let lease = self.config.idempotency.in_flight_lease();

        let existing = self
            .retrier
            .run(
                "ledger.lookup",
                || within(limit, ledger.lookup(&command.key), || LedgerError::timeout("lookup")),
                ledger_disposition,
            )
            .await
            .map_err(map_ledger_error)?;
        let mut entry = LedgerEntry::in_flight(
            command.key.clone(),
            command.fingerprint,
            now,
            self.config.idempotency.ttl(),
        );
        if let Some(stored) = existing {
            if let Some(claim) = settled_claim(&stored, command, now, lease)? {
                return Ok(claim);
            }
            // An abandoned attempt for the same request may have written its
            // records already. Finish that account rather than starting one.
            if stored.state == LedgerState::InFlight && stored.fingerprint == command.fingerprint {
                debug!(account_id = %stored.account_id, "resuming abandoned registration");
                entry = entry.resuming(stored.account_id);
            }
        }

        let begun = self
            .retrier
            .run(
                "ledger.begin",
                || within(limit, ledger.begin(&entry, lease), || LedgerError::timeout("begin")),
                ledger_disposition,
            )
            .await
            .map_err(map_ledger_error)?;

        match begun {
            BeginOutcome::Acquired => Ok(Claim::Acquired(entry)),
            // A retried `begin` whose first reply was lost sees its own entry.
            BeginOutcome::Existing(stored) if stored.claim_token == entry.claim_token => {
                Ok(Claim::Acquired(entry))
            }
            BeginOutcome::Existing(stored) => {
                settled_claim(&stored, command, now, lease)?.ok_or(RegistrationError::Conflict)
            }
        }
    }

    /// Run the primary writes and settle the ledger entry.
    async fn execute_claimed(
        &self,
        command: RegistrationCommand,
        entry: LedgerEntry,
    ) -> Result<RegisteredAccount, RegistrationError> {
        let result = self.write_primary(&command, entry.account_id).await;
        self.settle(&entry, &result).await;
        result
    }

    async fn settle(&self, entry: &LedgerEntry, result: &Result<RegisteredAccount, RegistrationError>) {
        let ledger = &self.ports.ledger;
        let limit = self.config.store_timeout;
        let outcome = match result {
            Ok(account) => RegistrationOutcome::Registered {
                account_id: account.profile.account_id,
                created_at: account.profile.created_at,
            },
            Err(RegistrationError::DuplicateEmail) => {
                RegistrationOutcome::Rejected(RejectionReason::DuplicateEmail)
            }
            Err(RegistrationError::DuplicateUsername) => {
                RegistrationOutcome::Rejected(RejectionReason::DuplicateUsername)
            }
            Err(err) => {
                debug_assert!(!err.is_terminal());
                let released = self
                    .retrier
                    .run(
                        "ledger.release",
                        || {
                            within(limit, ledger.release(&entry.key, entry.claim_token), || {
                                LedgerError::timeout("release")
                            })
                        },
                        ledger_disposition,
                    )
                    .await;
                if let Err(release_error) = released {
                    error!(
                        error = %release_error,
                        "failed to release idempotency key; it stays blocked until the lease ends"
                    );
                }
                return;
            }
        };

        let committed = self
            .retrier
            .run(
                "ledger.commit",
                || {
                    within(limit, ledger.commit(&entry.key, entry.claim_token, &outcome), || {
                        LedgerError::timeout("commit")
                    })
                },
                ledger_disposition,
            )
            .await;
        if let Err(commit_error) = committed {
            error!(
                error = %commit_error,
                "failed to record registration outcome; replays conflict until the lease ends, \
                 then resume the same account"
            );
        }
    }
}

/// Interpret a stored entry for a new attempt. `None` means the entry may be
/// overwritten.
fn settled_claim(
    entry: &LedgerEntry,
    command: &RegistrationCommand,
    now: chrono::DateTime<chrono::Utc>,
    lease: Duration,
) -> Result<Option<Claim>, RegistrationError> {
    if entry.is_claimable(now, lease) {
        return Ok(None);
    }
    if entry.fingerprint != command.fingerprint {
        return Err(RegistrationError::Conflict);
    }
    match &entry.state {
        LedgerState::InFlight => Err(RegistrationError::Conflict),
        LedgerState::Terminal(outcome) => Ok(Some(Claim::Replay(outcome.clone()))),
    }
}
