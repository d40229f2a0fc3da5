//! Domain-level error types.
//!
//! These errors are transport agnostic. Inbound adapters map them to HTTP
//! responses or any other protocol-specific envelope.

use std::fmt;

use serde_json::{Value, json};

use super::profile_query::ProfileQueryError;
use super::registration::{RegistrationError, RegistrationErrorKind};

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// The requested resource does not exist.
    NotFound,
    /// The request collides with existing state.
    Conflict,
    /// A dependency is temporarily unavailable; retrying may succeed.
    ServiceUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

impl ErrorCode {
    /// Snake-case wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::ServiceUnavailable => "service_unavailable",
            Self::InternalError => "internal_error",
        }
    }
}

/// Domain error payload.
///
/// # Examples
/// ```
/// use accounts_backend::domain::{Error, ErrorCode};
///
/// let err = Error::not_found("missing");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    code: ErrorCode,
    message: String,
    details: Option<Value>,
}

impl Error {
    /// Create a new error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary error details for adapters.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}

impl From<RegistrationError> for Error {
    fn from(value: RegistrationError) -> Self {
        let kind = value.kind();
        let base = match &value {
            RegistrationError::InvalidInput { field, message } => {
                return Self::invalid_request(message.clone()).with_details(json!({
                    "reason": kind.as_str(),
                    "field": field,
                }));
            }
            RegistrationError::DuplicateEmail
            | RegistrationError::DuplicateUsername
            | RegistrationError::Conflict => Self::conflict(value.to_string()),
            RegistrationError::StoreUnavailable { .. } => {
                Self::service_unavailable("registration is temporarily unavailable")
            }
            RegistrationError::Unknown { .. } => Self::internal(value.to_string()),
        };
        base.with_details(json!({ "reason": kind.as_str() }))
    }
}

impl From<ProfileQueryError> for Error {
    fn from(value: ProfileQueryError) -> Self {
        match value {
            ProfileQueryError::NotFound { account_id } => {
                Self::not_found(format!("profile {account_id} not found"))
            }
            ProfileQueryError::StoreUnavailable { .. } => {
                Self::service_unavailable("profile store is temporarily unavailable")
            }
        }
    }
}

impl RegistrationErrorKind {
    /// Snake-case name exposed to clients as the `reason` detail.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateEmail => "duplicate_email",
            Self::DuplicateUsername => "duplicate_username",
            Self::InvalidInput => "invalid_input",
            Self::Conflict => "conflict",
            Self::StoreUnavailable => "store_unavailable",
            Self::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountId;
    use rstest::rstest;

    #[rstest]
    #[case(RegistrationError::DuplicateEmail, ErrorCode::Conflict, "duplicate_email")]
    #[case(RegistrationError::DuplicateUsername, ErrorCode::Conflict, "duplicate_username")]
    #[case(RegistrationError::Conflict, ErrorCode::Conflict, "conflict")]
    #[case(
        RegistrationError::store_unavailable("pool exhausted"),
        ErrorCode::ServiceUnavailable,
        "store_unavailable"
    )]
    #[case(RegistrationError::unknown("join failed"), ErrorCode::InternalError, "unknown")]
    fn registration_errors_map_to_codes(
        #[case] source: RegistrationError,
        #[case] code: ErrorCode,
        #[case] reason: &str,
    ) {
        let error = Error::from(source);
        assert_eq!(error.code(), code);
        assert_eq!(error.details().map(|d| d["reason"].clone()), Some(json!(reason)));
    }

    #[test]
    fn invalid_input_carries_field_detail() {
        let error = Error::from(RegistrationError::invalid_input("email", "email is malformed"));
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
        assert_eq!(error.message(), "email is malformed");
        assert_eq!(error.details().map(|d| d["field"].clone()), Some(json!("email")));
    }

    #[test]
    fn store_unavailable_hides_driver_detail() {
        let error = Error::from(RegistrationError::store_unavailable("connection refused to 10.0.0.5"));
        assert!(!error.message().contains("10.0.0.5"));
    }

    #[test]
    fn missing_profile_maps_to_not_found() {
        let id = AccountId::random();
        let error = Error::from(ProfileQueryError::NotFound { account_id: id });
        assert_eq!(error.code(), ErrorCode::NotFound);
        assert!(error.message().contains(&id.to_string()));
    }
}
