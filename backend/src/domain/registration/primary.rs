//! Ordered primary writes and their compensation.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use super::{Inner, RegisteredAccount, RegistrationCommand, RegistrationError};
use crate::domain::ports::{
    CredentialStoreError, FlagReason, PasswordHashError, ProfileStoreError, ReconciliationFlag,
    ReconciliationLogError,
};
use crate::domain::retry::{RetryDisposition, within};
use crate::domain::{AccountId, CredentialRecord, PasswordHash, ProfileRecord};

fn credential_disposition(error: &CredentialStoreError) -> RetryDisposition {
    RetryDisposition::from_retryable(error.is_retryable())
}

fn profile_disposition(error: &ProfileStoreError) -> RetryDisposition {
    RetryDisposition::from_retryable(error.is_retryable())
}

fn flag_disposition(error: &ReconciliationLogError) -> RetryDisposition {
    RetryDisposition::from_retryable(error.is_retryable())
}

fn hash_disposition(error: &PasswordHashError) -> RetryDisposition {
    RetryDisposition::from_retryable(error.is_retryable())
}

/// Outcome of a failed compensating delete.
enum Compensation {
    Clean,
    Failed(String),
}

impl Inner {
    /// Pre-checks, hashing, and the ordered flag -> credential -> profile
    /// writes for one claimed attempt.
    ///
    /// `account_id` comes from the ledger claim. Records already stored under
    /// it belong to an abandoned attempt of this request and are kept.
    pub(super) async fn write_primary(
        &self,
        command: &RegistrationCommand,
        account_id: AccountId,
    ) -> Result<RegisteredAccount, RegistrationError> {
        let resumed_at = self.precheck(command, account_id).await?;
        let password_hash = self.hash_password(command).await?;

        let created_at = resumed_at.unwrap_or_else(|| self.clock.utc());
        let credential = CredentialRecord {
            account_id,
            email: command.email.clone(),
            password_hash,
            created_at,
        };
        let profile = ProfileRecord {
            account_id,
            username: command.username.clone(),
            display_attributes: command.display_attributes.clone(),
            created_at,
        };

        self.record_flag(&credential, FlagReason::PendingRegistration)
            .await
            .map_err(|err| RegistrationError::store_unavailable(err.to_string()))?;

        if let Err(err) = self.create_credential(&credential).await {
            self.settle_failed_credential(&credential).await;
            return Err(err);
        }

        if let Err(err) = self.create_profile(&profile).await {
            self.compensate(&credential, &err).await;
            return Err(err);
        }

        self.resolve_flag(&account_id).await;
        info!(account_id = %account_id, "account registered");
        Ok(RegisteredAccount {
            email: credential.email,
            profile,
        })
    }

    /// Best-effort uniqueness lookups. Lookup failures fall through to the
    /// store-level constraints.
    ///
    /// Records owned by `account_id` are not duplicates; their creation time
    /// is returned so the resumed account keeps it.
    async fn precheck(
        &self,
        command: &RegistrationCommand,
        account_id: AccountId,
    ) -> Result<Option<DateTime<Utc>>, RegistrationError> {
        let limit = self.config.store_timeout;
        let credentials = &self.ports.credentials;
        let profiles = &self.ports.profiles;

        let (by_email, by_username) = tokio::join!(
            within(limit, credentials.find_by_email(&command.email), || {
                CredentialStoreError::timeout("find_by_email")
            }),
            within(limit, profiles.find_by_username(&command.username), || {
                ProfileStoreError::timeout("find_by_username")
            }),
        );

        let mut resumed_at = None;
        match by_email {
            Ok(Some(found)) if found.account_id == account_id => resumed_at = Some(found.created_at),
            Ok(Some(_)) => return Err(RegistrationError::DuplicateEmail),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "email pre-check failed; relying on store constraint"),
        }
        match by_username {
            Ok(Some(found)) if found.account_id == account_id => {
                Ok(resumed_at.or(Some(found.created_at)))
            }
            Ok(Some(_)) => Err(RegistrationError::DuplicateUsername),
            Ok(None) => Ok(resumed_at),
            Err(err) => {
                warn!(error = %err, "username pre-check failed; relying on store constraint");
                Ok(resumed_at)
            }
        }
    }

    async fn hash_password(
        &self,
        command: &RegistrationCommand,
    ) -> Result<PasswordHash, RegistrationError> {
        let hasher = &self.ports.hasher;
        self.retrier
            .run(
                "password.hash",
                || hasher.hash(&command.password),
                hash_disposition,
            )
            .await
            .map_err(|err| RegistrationError::unknown(err.to_string()))
    }

    async fn record_flag(
        &self,
        credential: &CredentialRecord,
        reason: FlagReason,
    ) -> Result<(), ReconciliationLogError> {
        let log = &self.ports.reconciliation;
        let limit = self.config.store_timeout;
        let flag = ReconciliationFlag {
            account_id: credential.account_id,
            email: credential.email.clone(),
            reason,
            flagged_at: self.clock.utc(),
        };
        self.retrier
            .run(
                "reconciliation.record",
                || within(limit, log.record(&flag), || ReconciliationLogError::timeout("record")),
                flag_disposition,
            )
            .await
    }

    async fn resolve_flag(&self, account_id: &AccountId) {
        let log = &self.ports.reconciliation;
        let limit = self.config.store_timeout;
        let resolved = self
            .retrier
            .run(
                "reconciliation.resolve",
                || within(limit, log.resolve(account_id), || ReconciliationLogError::timeout("resolve")),
                flag_disposition,
            )
            .await;
        if let Err(err) = resolved {
            warn!(
                account_id = %account_id,
                error = %err,
                "failed to resolve reconciliation flag; the sweep will resolve it"
            );
        }
    }

    #[instrument(skip_all, fields(account_id = %credential.account_id))]
    async fn create_credential(&self, credential: &CredentialRecord) -> Result<(), RegistrationError> {
        let store = &self.ports.credentials;
        let limit = self.config.store_timeout;
        let account_id = credential.account_id;

        let created = self
            .retrier
            .run_with_probe(
                "credential.create",
                || within(limit, store.create(credential), || CredentialStoreError::timeout("create")),
                credential_disposition,
                || async move {
                    within(limit, store.find_by_account(&account_id), || {
                        CredentialStoreError::timeout("find_by_account")
                    })
                    .await
                    .map(|found| found.map(|_| ()))
                },
            )
            .await;

        match created {
            Ok(()) => Ok(()),
            // The account id is reserved by our claim, so only our own earlier
            // attempt can hold it.
            Err(CredentialStoreError::DuplicateAccount { .. }) => Ok(()),
            Err(CredentialStoreError::DuplicateEmail { .. }) => {
                // A retried create may hit the row its own lost attempt wrote.
                let owner = within(limit, store.find_by_email(&credential.email), || {
                    CredentialStoreError::timeout("find_by_email")
                })
                .await;
                match owner {
                    Ok(Some(found)) if found.account_id == account_id => Ok(()),
                    _ => Err(RegistrationError::DuplicateEmail),
                }
            }
            Err(err) => Err(RegistrationError::store_unavailable(err.to_string())),
        }
    }

    #[instrument(skip_all, fields(account_id = %profile.account_id))]
    async fn create_profile(&self, profile: &ProfileRecord) -> Result<(), RegistrationError> {
        let store = &self.ports.profiles;
        let limit = self.config.store_timeout;
        let account_id = profile.account_id;

        let created = self
            .retrier
            .run_with_probe(
                "profile.create",
                || within(limit, store.create(profile), || ProfileStoreError::timeout("create")),
                profile_disposition,
                || async move {
                    within(limit, store.find_by_account(&account_id), || {
                        ProfileStoreError::timeout("find_by_account")
                    })
                    .await
                    .map(|found| found.map(|_| ()))
                },
            )
            .await;

        match created {
            Ok(()) | Err(ProfileStoreError::DuplicateAccount { .. }) => Ok(()),
            Err(ProfileStoreError::DuplicateUsername { .. }) => {
                let owner = within(limit, store.find_by_username(&profile.username), || {
                    ProfileStoreError::timeout("find_by_username")
                })
                .await;
                match owner {
                    Ok(Some(found)) if found.account_id == account_id => Ok(()),
                    _ => Err(RegistrationError::DuplicateUsername),
                }
            }
            Err(err) => Err(RegistrationError::store_unavailable(err.to_string())),
        }
    }

    /// After a failed credential write, resolve the flag only when the
    /// credential is confirmed absent. Otherwise the sweep decides.
    async fn settle_failed_credential(&self, credential: &CredentialRecord) {
        let limit = self.config.store_timeout;
        let probe = within(
            limit,
            self.ports.credentials.find_by_account(&credential.account_id),
            || CredentialStoreError::timeout("find_by_account"),
        )
        .await;
        match probe {
            Ok(None) => self.resolve_flag(&credential.account_id).await,
            Ok(Some(_)) => warn!(
                account_id = %credential.account_id,
                "credential exists after failed write; leaving reconciliation flag"
            ),
            Err(err) => warn!(
                account_id = %credential.account_id,
                error = %err,
                "could not confirm credential absence; leaving reconciliation flag"
            ),
        }
    }

    /// Undo the credential write after the profile write failed.
    ///
    /// A username collision proves our profile was never stored, so only the
    /// credential is removed. Any other failure may have stored the profile
    /// before the reply was lost, so both are removed, profile first.
    async fn compensate(&self, credential: &CredentialRecord, cause: &RegistrationError) {
        let account_id = credential.account_id;
        let outcome = if matches!(cause, RegistrationError::DuplicateUsername) {
            self.delete_credential(&account_id).await
        } else {
            match self.delete_profile(&account_id).await {
                Compensation::Clean => self.delete_credential(&account_id).await,
                failed @ Compensation::Failed(_) => failed,
            }
        };

        match outcome {
            Compensation::Clean => {
                debug!(account_id = %account_id, "compensation completed");
                self.resolve_flag(&account_id).await;
            }
            Compensation::Failed(message) => {
                error!(
                    account_id = %account_id,
                    error = %message,
                    "compensating delete failed; escalating for reconciliation"
                );
                if let Err(err) = self
                    .record_flag(credential, FlagReason::CompensationFailed)
                    .await
                {
                    // The pending flag is still in place, so the sweep will
                    // pick the account up after the grace period.
                    error!(
                        account_id = %account_id,
                        error = %err,
                        "failed to escalate reconciliation flag"
                    );
                }
            }
        }
    }

    async fn delete_credential(&self, account_id: &AccountId) -> Compensation {
        let store = &self.ports.credentials;
        let limit = self.config.store_timeout;
        match self
            .retrier
            .run(
                "credential.delete",
                || within(limit, store.delete(account_id), || CredentialStoreError::timeout("delete")),
                credential_disposition,
            )
            .await
        {
            Ok(()) => Compensation::Clean,
            Err(err) => Compensation::Failed(err.to_string()),
        }
    }

    async fn delete_profile(&self, account_id: &AccountId) -> Compensation {
        let store = &self.ports.profiles;
        let limit = self.config.store_timeout;
        match self
            .retrier
            .run(
                "profile.delete",
                || within(limit, store.delete(account_id), || ProfileStoreError::timeout("delete")),
                profile_disposition,
            )
            .await
        {
            Ok(()) => Compensation::Clean,
            Err(err) => Compensation::Failed(err.to_string()),
        }
    }
}
