//! Secrets and the credential record that owns them.

use std::fmt;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use super::{AccountId, EmailAddress};

/// Maximum accepted raw password length in bytes.
pub const RAW_PASSWORD_MAX: usize = 1024;

/// Validation errors for [`RawPassword`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordValidationError {
    /// The password was empty.
    Empty,
    /// The password exceeded [`RAW_PASSWORD_MAX`] bytes.
    TooLong {
        /// Maximum permitted length.
        max: usize,
    },
}

impl fmt::Display for PasswordValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "password must not be empty"),
            Self::TooLong { max } => write!(f, "password must be at most {max} bytes"),
        }
    }
}

impl std::error::Error for PasswordValidationError {}

/// Plaintext password held only until it has been hashed.
///
/// The buffer is wiped on drop and never printed.
#[derive(Clone)]
pub struct RawPassword(Zeroizing<String>);

impl RawPassword {
    /// Accept a plaintext password. Whitespace is significant.
    pub fn new(raw: impl Into<String>) -> Result<Self, PasswordValidationError> {
        let raw = Zeroizing::new(raw.into());
        if raw.is_empty() {
            return Err(PasswordValidationError::Empty);
        }
        if raw.len() > RAW_PASSWORD_MAX {
            return Err(PasswordValidationError::TooLong {
                max: RAW_PASSWORD_MAX,
            });
        }
        Ok(Self(raw))
    }

    /// Expose the secret to a hasher.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawPassword(<redacted>)")
    }
}

/// Encoded one-way password hash (PHC string format for Argon2).
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap an encoded hash produced by a hasher or loaded from storage.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Borrow the encoded hash.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Credential record owned by the credential store. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub account_id: AccountId,
    pub email: EmailAddress,
    pub password_hash: PasswordHash,
    pub created_at: DateTime<Utc>,
}
