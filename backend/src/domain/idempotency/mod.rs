//! Idempotency primitives for registration retries.
//!
//! - [`IdempotencyKey`]: caller-supplied or derived key for one logical
//!   registration.
//! - [`RequestFingerprint`]: hash of the identifying request fields, used to
//!   reject key reuse with a different request.
//! - [`LedgerEntry`]: stored `in-flight` or `terminal` state for a key.
//! - [`IdempotencyConfig`]: retention window and in-flight lease.
//!
//! A key moves `absent -> in-flight -> terminal`. Expired entries behave as
//! absent. Terminal entries are never rewritten while they are live.

mod config;
mod fingerprint;
mod key;
mod record;

pub use config::{
    DefaultIdempotencyEnv, IDEMPOTENCY_TTL_HOURS_ENV, IdempotencyConfig, IdempotencyEnv,
};
pub use fingerprint::{RequestFingerprint, RequestFingerprintError};
pub use key::{IDEMPOTENCY_KEY_MAX, IdempotencyKey, IdempotencyKeyValidationError};
pub use record::{BeginOutcome, LedgerEntry, LedgerState, RegistrationOutcome, RejectionReason};
