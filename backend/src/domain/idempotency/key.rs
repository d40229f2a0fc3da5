//! Idempotency key validation and derivation.

use std::fmt;

use super::fingerprint::hash_framed;

/// Maximum idempotency key length in bytes.
pub const IDEMPOTENCY_KEY_MAX: usize = 255;

const DERIVED_PREFIX: &str = "drv-";

/// Validation errors for [`IdempotencyKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyKeyValidationError {
    /// The key string was empty.
    EmptyKey,
    /// The key exceeded [`IDEMPOTENCY_KEY_MAX`] bytes.
    TooLong {
        /// Maximum permitted length.
        max: usize,
    },
    /// The key contained whitespace, control or non-ASCII characters.
    InvalidCharacters,
}

impl fmt::Display for IdempotencyKeyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "idempotency key must not be empty"),
            Self::TooLong { max } => {
                write!(f, "idempotency key must be at most {max} bytes")
            }
            Self::InvalidCharacters => write!(
                f,
                "idempotency key must only contain visible ASCII characters",
            ),
        }
    }
}

impl std::error::Error for IdempotencyKeyValidationError {}

/// Opaque key identifying one logical registration attempt.
///
/// Clients usually send it in the `Idempotency-Key` header. When they do not,
/// a key can be derived from the normalised email, username and a client
/// nonce so that retries of the same form submission collapse onto one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Validate and construct an [`IdempotencyKey`].
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyKeyValidationError`] when the key is empty, too
    /// long or contains characters outside visible ASCII.
    ///
    /// # Example
    ///
    /// ```
    /// # use accounts_backend::domain::idempotency::IdempotencyKey;
    /// let key = IdempotencyKey::new("k1").expect("valid key");
    /// assert_eq!(key.as_ref(), "k1");
    /// ```
    pub fn new(key: impl Into<String>) -> Result<Self, IdempotencyKeyValidationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(IdempotencyKeyValidationError::EmptyKey);
        }
        if key.len() > IDEMPOTENCY_KEY_MAX {
            return Err(IdempotencyKeyValidationError::TooLong {
                max: IDEMPOTENCY_KEY_MAX,
            });
        }
        if !key.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(IdempotencyKeyValidationError::InvalidCharacters);
        }
        Ok(Self(key))
    }

    /// Derive a key from already-normalised registration identifiers.
    ///
    /// Each field is length-prefixed before hashing, so `("ab", "c")` and
    /// `("a", "bc")` never collide.
    ///
    /// # Example
    ///
    /// ```
    /// # use accounts_backend::domain::idempotency::IdempotencyKey;
    /// let a = IdempotencyKey::derive("a@x.com", "ada", "nonce-1");
    /// let b = IdempotencyKey::derive("a@x.com", "ada", "nonce-1");
    /// assert_eq!(a, b);
    /// assert!(a.as_ref().starts_with("drv-"));
    /// ```
    pub fn derive(email: &str, username: &str, client_nonce: &str) -> Self {
        let digest = hash_framed([email, username, client_nonce]);
        Self(format!("{DERIVED_PREFIX}{}", hex::encode(digest)))
    }

    /// Whether the key was produced by [`IdempotencyKey::derive`].
    pub fn is_derived(&self) -> bool {
        self.0.starts_with(DERIVED_PREFIX)
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.0
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = IdempotencyKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
