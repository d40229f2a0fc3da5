//! Error taxonomy surfaced by the registration use case.

use thiserror::Error;

/// Failure returned by [`super::RegistrationService::register`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The request failed validation; nothing was written.
    #[error("invalid {field}: {message}")]
    InvalidInput {
        /// Request field that failed validation.
        field: String,
        /// Human-readable reason.
        message: String,
    },
    /// The email already belongs to another account.
    #[error("email is already registered")]
    DuplicateEmail,
    /// The username already belongs to another account.
    #[error("username is already taken")]
    DuplicateUsername,
    /// The idempotency key is held by an unfinished attempt or was used for a
    /// different request.
    #[error("idempotency key is in use by another registration")]
    Conflict,
    /// A store stayed unavailable after retries. The same key may be retried.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        /// Diagnostic detail; never shown to clients.
        message: String,
    },
    /// Unexpected internal failure.
    #[error("unexpected registration failure: {message}")]
    Unknown {
        /// Diagnostic detail; never shown to clients.
        message: String,
    },
}

/// Field-free discriminant of [`RegistrationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationErrorKind {
    DuplicateEmail,
    DuplicateUsername,
    InvalidInput,
    Conflict,
    StoreUnavailable,
    Unknown,
}

impl RegistrationError {
    /// Build [`RegistrationError::InvalidInput`].
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build [`RegistrationError::StoreUnavailable`].
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Build [`RegistrationError::Unknown`].
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Discriminant of the error.
    pub fn kind(&self) -> RegistrationErrorKind {
        match self {
            Self::InvalidInput { .. } => RegistrationErrorKind::InvalidInput,
            Self::DuplicateEmail => RegistrationErrorKind::DuplicateEmail,
            Self::DuplicateUsername => RegistrationErrorKind::DuplicateUsername,
            Self::Conflict => RegistrationErrorKind::Conflict,
            Self::StoreUnavailable { .. } => RegistrationErrorKind::StoreUnavailable,
            Self::Unknown { .. } => RegistrationErrorKind::Unknown,
        }
    }

    /// Whether the ledger should keep this outcome for replay.
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self, Self::DuplicateEmail | Self::DuplicateUsername)
    }
}
