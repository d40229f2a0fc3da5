//! Registration input, its validated form, and the success receipt.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use super::RegistrationError;
use crate::domain::idempotency::{IdempotencyKey, RequestFingerprint};
use crate::domain::{
    AccountId, AccountValidationError, DisplayAttributes, EmailAddress, RawPassword, Username,
};

/// Unvalidated registration input as received from an inbound adapter.
#[derive(Clone)]
pub struct RegistrationRequest {
    pub email: String,
    pub username: String,
    pub raw_password: Zeroizing<String>,
    pub display_attributes: BTreeMap<String, String>,
    pub idempotency_key: String,
}

impl RegistrationRequest {
    /// Derive an idempotency key for clients that send a nonce instead of a
    /// key. Email and username are normalised first so that cosmetic
    /// differences in a retried form submission map to the same key.
    ///
    /// ```
    /// use accounts_backend::domain::registration::RegistrationRequest;
    ///
    /// let a = RegistrationRequest::derived_key(" A@X.com", "Ada", "n-1");
    /// let b = RegistrationRequest::derived_key("a@x.com", "ada ", "n-1");
    /// assert_eq!(a, b);
    /// ```
    pub fn derived_key(email: &str, username: &str, client_nonce: &str) -> IdempotencyKey {
        IdempotencyKey::derive(
            &email.trim().to_lowercase(),
            &username.trim().to_lowercase(),
            client_nonce,
        )
    }
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("raw_password", &"<redacted>")
            .field("display_attributes", &self.display_attributes)
            .field("idempotency_key", &self.idempotency_key)
            .finish()
    }
}

/// Validated registration input.
#[derive(Debug, Clone)]
pub struct RegistrationCommand {
    pub key: IdempotencyKey,
    pub fingerprint: RequestFingerprint,
    pub email: EmailAddress,
    pub username: Username,
    pub password: RawPassword,
    pub display_attributes: DisplayAttributes,
}

impl TryFrom<RegistrationRequest> for RegistrationCommand {
    type Error = RegistrationError;

    fn try_from(request: RegistrationRequest) -> Result<Self, Self::Error> {
        let RegistrationRequest {
            email,
            username,
            raw_password,
            display_attributes,
            idempotency_key,
        } = request;

        let email = EmailAddress::new(email).map_err(invalid)?;
        let username = Username::new(username).map_err(invalid)?;
        let password = RawPassword::new(raw_password.as_str())
            .map_err(|err| RegistrationError::invalid_input("password", err.to_string()))?;
        let display_attributes = DisplayAttributes::new(display_attributes).map_err(invalid)?;
        let key = IdempotencyKey::new(idempotency_key)
            .map_err(|err| RegistrationError::invalid_input("idempotencyKey", err.to_string()))?;

        let fingerprint = RequestFingerprint::of_fields(
            [email.as_str(), username.as_str()]
                .into_iter()
                .chain(display_attributes.iter().flat_map(|(k, v)| [k, v])),
        );

        Ok(Self {
            key,
            fingerprint,
            email,
            username,
            password,
            display_attributes,
        })
    }
}

fn invalid(err: AccountValidationError) -> RegistrationError {
    RegistrationError::invalid_input(err.field(), err.to_string())
}

/// Successful registration result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    /// `true` when the receipt was replayed from the ledger.
    pub replayed: bool,
}
