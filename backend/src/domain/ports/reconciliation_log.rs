//! Port abstraction for reconciliation flags on possibly orphaned accounts.
//!
//! A flag is written before the credential record so that any credential
//! without a matching profile is discoverable by the maintenance sweep.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AccountId, EmailAddress};

use super::define_port_error;

define_port_error! {
    /// Errors raised by reconciliation log adapters.
    pub enum ReconciliationLogError {
        /// Store connection could not be established.
        Connection { message: String } => "reconciliation log connection failed: {message}" => retryable,
        /// The call did not finish within its deadline.
        Timeout { operation: String } => "reconciliation log {operation} timed out" => retryable,
        /// Query or mutation failed during execution.
        Query { message: String } => "reconciliation log query failed: {message}" => retryable,
        /// A stored flag could not be decoded.
        Corrupt { message: String } => "reconciliation flag is corrupt: {message}",
    }
}

/// Why an account needs reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagReason {
    /// Registration started its primary writes and has not settled.
    PendingRegistration,
    /// A compensating delete failed; the credential may be orphaned.
    CompensationFailed,
}

impl FlagReason {
    /// Stable storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingRegistration => "pending_registration",
            Self::CompensationFailed => "compensation_failed",
        }
    }
}

impl fmt::Display for FlagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagReason {
    type Err = ReconciliationLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_registration" => Ok(Self::PendingRegistration),
            "compensation_failed" => Ok(Self::CompensationFailed),
            other => Err(ReconciliationLogError::corrupt(format!(
                "unknown flag reason {other}"
            ))),
        }
    }
}

/// Durable marker for an account whose primary records may be inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationFlag {
    pub account_id: AccountId,
    pub email: EmailAddress,
    pub reason: FlagReason,
    pub flagged_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    /// Insert or overwrite the flag for `flag.account_id`.
    async fn record(&self, flag: &ReconciliationFlag) -> Result<(), ReconciliationLogError>;

    /// Remove the flag for an account. Resolving a missing flag succeeds.
    async fn resolve(&self, account_id: &AccountId) -> Result<(), ReconciliationLogError>;

    /// Flags that need attention: every `CompensationFailed` flag plus
    /// `PendingRegistration` flags raised at or before `pending_cutoff`.
    /// Oldest first, at most `limit`.
    async fn due(
        &self,
        pending_cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReconciliationFlag>, ReconciliationLogError>;
}
