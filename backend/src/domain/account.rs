//! Account identity and the user-chosen identifiers attached to it.
//!
//! Types here are plain domain values: they validate on construction and carry
//! no serialisation contract. Adapters convert them to rows or DTOs through
//! explicit mapping functions.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

/// Maximum length of an email address in bytes.
pub const EMAIL_MAX: usize = 254;
/// Minimum username length in characters.
pub const USERNAME_MIN: usize = 3;
/// Maximum username length in characters.
pub const USERNAME_MAX: usize = 32;
/// Maximum number of display attributes per profile.
pub const DISPLAY_ATTRIBUTES_MAX: usize = 32;
/// Maximum display attribute key length in characters.
pub const ATTRIBUTE_KEY_MAX: usize = 64;
/// Maximum display attribute value length in characters.
pub const ATTRIBUTE_VALUE_MAX: usize = 512;

/// Validation errors for account identifiers and profile attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyAccountId,
    InvalidAccountId,
    EmptyEmail,
    EmailTooLong { max: usize },
    MalformedEmail,
    EmptyUsername,
    UsernameTooShort { min: usize },
    UsernameTooLong { max: usize },
    UsernameInvalidCharacters,
    TooManyAttributes { max: usize },
    EmptyAttributeKey,
    DuplicateAttributeKey { key: String },
    AttributeKeyTooLong { max: usize },
    AttributeValueTooLong { max: usize },
}

impl AccountValidationError {
    /// Name of the input field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyAccountId | Self::InvalidAccountId => "accountId",
            Self::EmptyEmail | Self::EmailTooLong { .. } | Self::MalformedEmail => "email",
            Self::EmptyUsername
            | Self::UsernameTooShort { .. }
            | Self::UsernameTooLong { .. }
            | Self::UsernameInvalidCharacters => "username",
            Self::TooManyAttributes { .. }
            | Self::EmptyAttributeKey
            | Self::DuplicateAttributeKey { .. }
            | Self::AttributeKeyTooLong { .. }
            | Self::AttributeValueTooLong { .. } => "displayAttributes",
        }
    }
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAccountId => write!(f, "account id must not be empty"),
            Self::InvalidAccountId => write!(f, "account id must be a valid UUID"),
            Self::EmptyEmail => write!(f, "email must not be empty"),
            Self::EmailTooLong { max } => write!(f, "email must be at most {max} bytes"),
            Self::MalformedEmail => write!(f, "email must look like local@domain.tld"),
            Self::EmptyUsername => write!(f, "username must not be empty"),
            Self::UsernameTooShort { min } => {
                write!(f, "username must be at least {min} characters")
            }
            Self::UsernameTooLong { max } => {
                write!(f, "username must be at most {max} characters")
            }
            Self::UsernameInvalidCharacters => write!(
                f,
                "username may only contain letters, digits, '.', '-' or '_'",
            ),
            Self::TooManyAttributes { max } => {
                write!(f, "at most {max} display attributes are allowed")
            }
            Self::EmptyAttributeKey => write!(f, "display attribute keys must not be empty"),
            Self::DuplicateAttributeKey { key } => {
                write!(f, "display attribute key {key:?} is given more than once")
            }
            Self::AttributeKeyTooLong { max } => {
                write!(f, "display attribute keys must be at most {max} characters")
            }
            Self::AttributeValueTooLong { max } => {
                write!(f, "display attribute values must be at most {max} characters")
            }
        }
    }
}

impl std::error::Error for AccountValidationError {}

/// Immutable account identifier shared by every store as the join key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Parse an account identifier from its canonical UUID form.
    ///
    /// # Example
    ///
    /// ```
    /// use accounts_backend::domain::AccountId;
    ///
    /// let id = AccountId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("valid id");
    /// assert_eq!(id.to_string(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
    /// ```
    pub fn new(id: impl AsRef<str>) -> Result<Self, AccountValidationError> {
        let raw = id.as_ref();
        if raw.is_empty() {
            return Err(AccountValidationError::EmptyAccountId);
        }
        if raw.trim() != raw {
            return Err(AccountValidationError::InvalidAccountId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| AccountValidationError::InvalidAccountId)
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an already validated UUID (e.g. loaded from a database row).
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Normalised (trimmed, lowercased) email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Borrow the normalised address.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Validate and normalise an email address.
    ///
    /// # Example
    ///
    /// ```
    /// use accounts_backend::domain::EmailAddress;
    ///
    /// let email = EmailAddress::new("  Ada@Example.COM ").expect("valid email");
    /// assert_eq!(email.as_ref(), "ada@example.com");
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AccountValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(AccountValidationError::EmptyEmail);
        }
        if trimmed.len() > EMAIL_MAX {
            return Err(AccountValidationError::EmailTooLong { max: EMAIL_MAX });
        }
        let normalised = trimmed.to_lowercase();
        if !is_plausible_email(&normalised) {
            return Err(AccountValidationError::MalformedEmail);
        }
        Ok(Self(normalised))
    }
}

fn is_plausible_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalised (trimmed, lowercased) unique username.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Borrow the normalised username.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Validate and normalise a username.
    ///
    /// # Example
    ///
    /// ```
    /// use accounts_backend::domain::Username;
    ///
    /// assert_eq!(Username::new(" Bob ").expect("valid").as_ref(), "bob");
    /// assert!(Username::new("no spaces").is_err());
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AccountValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(AccountValidationError::EmptyUsername);
        }
        let length = trimmed.chars().count();
        if length < USERNAME_MIN {
            return Err(AccountValidationError::UsernameTooShort { min: USERNAME_MIN });
        }
        if length > USERNAME_MAX {
            return Err(AccountValidationError::UsernameTooLong { max: USERNAME_MAX });
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(AccountValidationError::UsernameInvalidCharacters);
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-form profile attributes (avatar colour, bio, locale, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayAttributes(BTreeMap<String, String>);

impl DisplayAttributes {
    /// Validate a map of display attributes. Keys are trimmed, and two keys
    /// that trim to the same name are rejected.
    pub fn new(raw: BTreeMap<String, String>) -> Result<Self, AccountValidationError> {
        if raw.len() > DISPLAY_ATTRIBUTES_MAX {
            return Err(AccountValidationError::TooManyAttributes {
                max: DISPLAY_ATTRIBUTES_MAX,
            });
        }
        let mut validated = BTreeMap::new();
        for (key, value) in raw {
            let trimmed = key.trim();
            if trimmed.is_empty() {
                return Err(AccountValidationError::EmptyAttributeKey);
            }
            if trimmed.chars().count() > ATTRIBUTE_KEY_MAX {
                return Err(AccountValidationError::AttributeKeyTooLong {
                    max: ATTRIBUTE_KEY_MAX,
                });
            }
            if value.chars().count() > ATTRIBUTE_VALUE_MAX {
                return Err(AccountValidationError::AttributeValueTooLong {
                    max: ATTRIBUTE_VALUE_MAX,
                });
            }
            if validated.contains_key(trimmed) {
                return Err(AccountValidationError::DuplicateAttributeKey {
                    key: trimmed.to_owned(),
                });
            }
            validated.insert(trimmed.to_owned(), value);
        }
        Ok(Self(validated))
    }

    /// Empty attribute set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up one attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no attributes are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}
