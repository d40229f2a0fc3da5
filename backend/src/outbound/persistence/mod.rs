//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Every driven store port has a Diesel implementation here, backed by
//! `diesel-async` and a `bb8` pool:
//!
//! - [`DieselCredentialStore`] and [`DieselProfileStore`]: primary records.
//! - [`DieselRegistrationLedger`]: idempotency ledger with atomic claims.
//! - [`DieselReconciliationLog`]: flags for possibly orphaned credentials.
//! - [`DieselJobOutbox`]: transactional outbox behind the `JobQueue` port.
//!
//! Row structs (`models.rs`) and table definitions (`schema.rs`) are internal
//! and never reach the domain. Unique violations are told apart by
//! constraint name so the domain sees `DuplicateEmail` or
//! `DuplicateUsername` rather than a driver error.
//!
//! # Example
//!
//! ```ignore
//! use accounts_backend::outbound::persistence::{DbPool, DieselCredentialStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/accounts")).await?;
//! let credentials = DieselCredentialStore::new(pool.clone());
//! ```

mod diesel_credential_store;
mod diesel_job_outbox;
mod diesel_profile_store;
mod diesel_reconciliation_log;
mod diesel_registration_ledger;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_credential_store::DieselCredentialStore;
pub use diesel_job_outbox::DieselJobOutbox;
pub use diesel_profile_store::DieselProfileStore;
pub use diesel_reconciliation_log::DieselReconciliationLog;
pub use diesel_registration_ledger::DieselRegistrationLedger;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
