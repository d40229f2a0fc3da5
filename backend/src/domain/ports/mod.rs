//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (stores, cache, queue, ledger, hasher) are implemented by
//! outbound adapters. Driving ports ([`AccountRegistration`],
//! [`ProfileQuery`]) are what inbound adapters call.

mod macros;
pub(crate) use macros::define_port_error;

mod account_registration;
mod credential_store;
mod job_queue;
mod password_hasher;
mod profile_cache;
mod profile_query;
mod profile_store;
mod reconciliation_log;
mod registration_ledger;

pub use account_registration::AccountRegistration;
#[cfg(test)]
pub use account_registration::MockAccountRegistration;
pub use credential_store::{CredentialStore, CredentialStoreError};
#[cfg(test)]
pub use credential_store::MockCredentialStore;
pub use job_queue::{FixtureJobQueue, JobDispatchError, JobQueue};
#[cfg(test)]
pub use job_queue::MockJobQueue;
pub use password_hasher::{FixturePasswordHasher, PasswordHashError, PasswordHasher};
#[cfg(test)]
pub use password_hasher::MockPasswordHasher;
pub use profile_cache::{FixtureProfileCache, ProfileCache, ProfileCacheError};
#[cfg(test)]
pub use profile_cache::MockProfileCache;
#[cfg(test)]
pub use profile_query::MockProfileQuery;
pub use profile_query::ProfileQuery;
#[cfg(test)]
pub use profile_store::MockProfileStore;
pub use profile_store::{ProfileStore, ProfileStoreError};
#[cfg(test)]
pub use reconciliation_log::MockReconciliationLog;
pub use reconciliation_log::{
    FlagReason, ReconciliationFlag, ReconciliationLog, ReconciliationLogError,
};
#[cfg(test)]
pub use registration_ledger::MockRegistrationLedger;
pub use registration_ledger::{LedgerError, RegistrationLedger};
