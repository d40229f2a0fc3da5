//! Domain primitives, ports, and use-case services.
//!
//! Purpose: Define strongly typed account entities and the services that
//! register accounts and read profiles. Adapters live outside this module and
//! talk to it only through [`ports`].
//!
//! Public surface:
//! - Account values ([`AccountId`], [`EmailAddress`], [`Username`],
//!   [`DisplayAttributes`]) and primary records ([`CredentialRecord`],
//!   [`ProfileRecord`]).
//! - [`RegistrationService`]: the register-user orchestrator.
//! - [`ProfileQueryService`]: cached profile reads.
//! - [`MaintenanceSweep`]: reconciliation of half-written registrations.
//! - [`Error`] / [`ErrorCode`]: transport-neutral failure payload.

pub mod account;
pub mod credential;
pub mod error;
pub mod idempotency;
pub mod jobs;
pub mod maintenance;
pub mod ports;
pub mod profile;
pub mod profile_query;
pub mod registration;
pub mod retry;

pub use self::account::{
    AccountId, AccountValidationError, DisplayAttributes, EmailAddress, Username,
};
pub use self::credential::{
    CredentialRecord, PasswordHash, PasswordValidationError, RawPassword,
};
pub use self::error::{Error, ErrorCode};
pub use self::jobs::{JobDescriptor, JobType, ParseJobTypeError};
pub use self::maintenance::{MaintenanceConfig, MaintenanceSweep, SweepReport};
pub use self::profile::ProfileRecord;
pub use self::profile_query::{ProfileQueryConfig, ProfileQueryError, ProfileQueryService};
pub use self::registration::{
    RegistrationConfig, RegistrationError, RegistrationErrorKind, RegistrationPorts,
    RegistrationReceipt, RegistrationRequest, RegistrationService,
};
pub use self::retry::RetryPolicy;
