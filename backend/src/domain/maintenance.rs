//! Periodic reconciliation of half-written registrations and ledger expiry.
//!
//! Each pass looks at due reconciliation flags and compares the credential and
//! profile stores for the flagged account:
//!
//! | credential | profile | action                                   |
//! |------------|---------|------------------------------------------|
//! | present    | present | resolve (registration completed)         |
//! | present    | absent  | delete credential, then resolve          |
//! | absent     | present | delete profile, then resolve             |
//! | absent     | absent  | resolve (nothing was left behind)        |
//!
//! Failures leave the flag in place for the next pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use mockable::Clock;
use tracing::{info, instrument, warn};

use crate::domain::ports::{
    CredentialStore, CredentialStoreError, LedgerError, ProfileStore, ProfileStoreError,
    ReconciliationFlag, ReconciliationLog, ReconciliationLogError, RegistrationLedger,
};
use crate::domain::retry::within;

/// Sweep tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceConfig {
    /// Age after which a pending registration flag is treated as stale.
    pub reconciliation_grace: Duration,
    /// Flags examined per pass.
    pub batch_size: usize,
    /// Deadline for each store call.
    pub store_timeout: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            reconciliation_grace: Duration::from_secs(5 * 60),
            batch_size: 100,
            store_timeout: Duration::from_secs(2),
        }
    }
}

/// Counters from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Flags examined.
    pub examined: usize,
    /// Flags resolved.
    pub resolved: usize,
    /// Orphaned credentials deleted.
    pub credentials_deleted: usize,
    /// Orphaned profiles deleted.
    pub profiles_deleted: usize,
    /// Flags left in place because a store call failed.
    pub failed: usize,
    /// Expired ledger entries removed.
    pub ledger_purged: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repair {
    Consistent,
    DeletedCredential,
    DeletedProfile,
}

/// Drives reconciliation and ledger expiry.
#[derive(Clone)]
pub struct MaintenanceSweep {
    credentials: Arc<dyn CredentialStore>,
    profiles: Arc<dyn ProfileStore>,
    reconciliation: Arc<dyn ReconciliationLog>,
    ledger: Arc<dyn RegistrationLedger>,
    clock: Arc<dyn Clock>,
    config: MaintenanceConfig,
}

impl MaintenanceSweep {
    /// Build a sweep over the given ports.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        profiles: Arc<dyn ProfileStore>,
        reconciliation: Arc<dyn ReconciliationLog>,
        ledger: Arc<dyn RegistrationLedger>,
        clock: Arc<dyn Clock>,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            credentials,
            profiles,
            reconciliation,
            ledger,
            clock,
            config,
        }
    }

    /// Run one pass. Never fails: problems are logged and counted.
    #[instrument(name = "maintenance.sweep", skip_all)]
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.clock.utc();
        let grace = TimeDelta::from_std(self.config.reconciliation_grace).unwrap_or(TimeDelta::MAX);
        let cutoff = now.checked_sub_signed(grace).unwrap_or(now);

        let limit = self.config.store_timeout;
        let due = within(
            limit,
            self.reconciliation.due(cutoff, self.config.batch_size),
            || ReconciliationLogError::timeout("due"),
        )
        .await;
        match due {
            Ok(flags) => {
                for flag in flags {
                    report.examined += 1;
                    match self.reconcile(&flag).await {
                        Ok(repair) => {
                            report.resolved += 1;
                            match repair {
                                Repair::Consistent => {}
                                Repair::DeletedCredential => report.credentials_deleted += 1,
                                Repair::DeletedProfile => report.profiles_deleted += 1,
                            }
                        }
                        Err(message) => {
                            report.failed += 1;
                            warn!(
                                account_id = %flag.account_id,
                                reason = %flag.reason,
                                error = %message,
                                "reconciliation deferred"
                            );
                        }
                    }
                }
            }
            Err(err) => warn!(error = %err, "could not list reconciliation flags"),
        }

        let purged = within(limit, self.ledger.purge_expired(now), || {
            LedgerError::timeout("purge_expired")
        })
        .await;
        match purged {
            Ok(count) => report.ledger_purged = count,
            Err(err) => warn!(error = %err, "could not purge expired ledger entries"),
        }

        if report != SweepReport::default() {
            info!(
                examined = report.examined,
                resolved = report.resolved,
                credentials_deleted = report.credentials_deleted,
                profiles_deleted = report.profiles_deleted,
                failed = report.failed,
                ledger_purged = report.ledger_purged,
                "maintenance sweep finished"
            );
        }
        report
    }

    async fn reconcile(&self, flag: &ReconciliationFlag) -> Result<Repair, String> {
        let limit = self.config.store_timeout;
        let account_id = &flag.account_id;

        let (credential, profile) = tokio::join!(
            within(limit, self.credentials.find_by_account(account_id), || {
                CredentialStoreError::timeout("find_by_account")
            }),
            within(limit, self.profiles.find_by_account(account_id), || {
                ProfileStoreError::timeout("find_by_account")
            }),
        );
        let credential = credential.map_err(|err| err.to_string())?;
        let profile = profile.map_err(|err| err.to_string())?;

        let repair = match (credential, profile) {
            (Some(_), Some(_)) | (None, None) => Repair::Consistent,
            (Some(_), None) => {
                within(limit, self.credentials.delete(account_id), || {
                    CredentialStoreError::timeout("delete")
                })
                .await
                .map_err(|err| err.to_string())?;
                Repair::DeletedCredential
            }
            (None, Some(_)) => {
                within(limit, self.profiles.delete(account_id), || {
                    ProfileStoreError::timeout("delete")
                })
                .await
                .map_err(|err| err.to_string())?;
                Repair::DeletedProfile
            }
        };

        within(limit, self.reconciliation.resolve(account_id), || {
            ReconciliationLogError::timeout("resolve")
        })
        .await
        .map_err(|err| err.to_string())?;
        Ok(repair)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockall::predicate::{always, eq};
    use rstest::rstest;

    use super::*;
    use crate::domain::ports::{
        FlagReason, MockCredentialStore, MockProfileStore, MockReconciliationLog,
        MockRegistrationLedger,
    };
    use crate::domain::{
        AccountId, CredentialRecord, DisplayAttributes, EmailAddress, PasswordHash,
        ProfileRecord, Username,
    };
    use crate::test_support::MutableClock;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).single().expect("valid")
    }

    fn flag(account_id: AccountId) -> ReconciliationFlag {
        ReconciliationFlag {
            account_id,
            email: EmailAddress::new("a@x.com").expect("email"),
            reason: FlagReason::CompensationFailed,
            flagged_at: now(),
        }
    }

    fn credential(account_id: AccountId) -> CredentialRecord {
        CredentialRecord {
            account_id,
            email: EmailAddress::new("a@x.com").expect("email"),
            password_hash: PasswordHash::new("hash"),
            created_at: now(),
        }
    }

    fn profile(account_id: AccountId) -> ProfileRecord {
        ProfileRecord {
            account_id,
            username: Username::new("ada").expect("username"),
            display_attributes: DisplayAttributes::empty(),
            created_at: now(),
        }
    }

    fn quiet_ledger() -> MockRegistrationLedger {
        let mut ledger = MockRegistrationLedger::new();
        ledger.expect_purge_expired().returning(|_| Ok(0));
        ledger
    }

    fn sweep(
        credentials: MockCredentialStore,
        profiles: MockProfileStore,
        log: MockReconciliationLog,
        ledger: MockRegistrationLedger,
    ) -> MaintenanceSweep {
        MaintenanceSweep::new(
            Arc::new(credentials),
            Arc::new(profiles),
            Arc::new(log),
            Arc::new(ledger),
            Arc::new(MutableClock::new(now())),
            MaintenanceConfig::default(),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn orphaned_credential_is_deleted_and_flag_resolved() {
        let id = AccountId::random();
        let mut log = MockReconciliationLog::new();
        log.expect_due()
            .with(
                eq(now() - TimeDelta::minutes(5)),
                eq(MaintenanceConfig::default().batch_size),
            )
            .return_once(move |_, _| Ok(vec![flag(id)]));
        log.expect_resolve().with(eq(id)).times(1).returning(|_| Ok(()));
        let mut credentials = MockCredentialStore::new();
        credentials
            .expect_find_by_account()
            .returning(move |_| Ok(Some(credential(id))));
        credentials.expect_delete().with(eq(id)).times(1).returning(|_| Ok(()));
        let mut profiles = MockProfileStore::new();
        profiles.expect_find_by_account().returning(|_| Ok(None));

        let report = sweep(credentials, profiles, log, quiet_ledger()).run_once().await;
        assert_eq!(report.resolved, 1);
        assert_eq!(report.credentials_deleted, 1);
    }

    #[rstest]
    #[case::complete(true, true)]
    #[case::never_written(false, false)]
    #[tokio::test]
    async fn consistent_accounts_are_resolved_without_deletes(
        #[case] has_credential: bool,
        #[case] has_profile: bool,
    ) {
        let id = AccountId::random();
        let mut log = MockReconciliationLog::new();
        log.expect_due().return_once(move |_, _| Ok(vec![flag(id)]));
        log.expect_resolve().times(1).returning(|_| Ok(()));
        let mut credentials = MockCredentialStore::new();
        credentials
            .expect_find_by_account()
            .returning(move |_| Ok(has_credential.then(|| credential(id))));
        credentials.expect_delete().never();
        let mut profiles = MockProfileStore::new();
        profiles
            .expect_find_by_account()
            .returning(move |_| Ok(has_profile.then(|| profile(id))));
        profiles.expect_delete().never();

        let report = sweep(credentials, profiles, log, quiet_ledger()).run_once().await;
        assert_eq!(report.resolved, 1);
        assert_eq!(report.credentials_deleted + report.profiles_deleted, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn orphaned_profile_is_deleted() {
        let id = AccountId::random();
        let mut log = MockReconciliationLog::new();
        log.expect_due().return_once(move |_, _| Ok(vec![flag(id)]));
        log.expect_resolve().returning(|_| Ok(()));
        let mut credentials = MockCredentialStore::new();
        credentials.expect_find_by_account().returning(|_| Ok(None));
        let mut profiles = MockProfileStore::new();
        profiles
            .expect_find_by_account()
            .returning(move |_| Ok(Some(profile(id))));
        profiles.expect_delete().times(1).returning(|_| Ok(()));

        let report = sweep(credentials, profiles, log, quiet_ledger()).run_once().await;
        assert_eq!(report.profiles_deleted, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_delete_leaves_flag_in_place() {
        let id = AccountId::random();
        let mut log = MockReconciliationLog::new();
        log.expect_due().return_once(move |_, _| Ok(vec![flag(id)]));
        log.expect_resolve().never();
        let mut credentials = MockCredentialStore::new();
        credentials
            .expect_find_by_account()
            .returning(move |_| Ok(Some(credential(id))));
        credentials
            .expect_delete()
            .returning(|_| Err(CredentialStoreError::connection("down")));
        let mut profiles = MockProfileStore::new();
        profiles.expect_find_by_account().returning(|_| Ok(None));

        let report = sweep(credentials, profiles, log, quiet_ledger()).run_once().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.resolved, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn ledger_purge_runs_even_when_listing_fails() {
        let mut log = MockReconciliationLog::new();
        log.expect_due()
            .return_once(|_, _| Err(ReconciliationLogError::query("syntax")));
        let mut ledger = MockRegistrationLedger::new();
        ledger
            .expect_purge_expired()
            .with(always())
            .times(1)
            .returning(|_| Ok(4));

        let report = sweep(
            MockCredentialStore::new(),
            MockProfileStore::new(),
            log,
            ledger,
        )
        .run_once()
        .await;
        assert_eq!(report.ledger_purged, 4);
        assert_eq!(report.examined, 0);
    }
}
