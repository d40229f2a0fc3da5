//! Request fingerprints used to detect idempotency key reuse.

use std::fmt;

use sha2::{Digest, Sha256};

/// Errors raised when decoding a stored [`RequestFingerprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFingerprintError {
    /// The stored value was not valid hexadecimal.
    InvalidHex,
    /// The decoded value had an incorrect length.
    InvalidLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        actual: usize,
    },
}

impl fmt::Display for RequestFingerprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHex => write!(f, "request fingerprint must be hexadecimal"),
            Self::InvalidLength { expected, actual } => {
                write!(f, "request fingerprint must be {expected} bytes, got {actual}")
            }
        }
    }
}

impl std::error::Error for RequestFingerprintError {}

/// SHA-256 over the identifying fields of a registration request.
///
/// The raw password never contributes: two submissions that differ only in
/// password are the same logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestFingerprint([u8; 32]);

impl RequestFingerprint {
    /// Hash the ordered list of fields.
    pub fn of_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        Self(hash_framed(fields))
    }

    /// Decode a fingerprint previously produced by [`RequestFingerprint::to_hex`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestFingerprintError`] for malformed input.
    pub fn from_hex(raw: &str) -> Result<Self, RequestFingerprintError> {
        let bytes = hex::decode(raw).map_err(|_| RequestFingerprintError::InvalidHex)?;
        let actual = bytes.len();
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RequestFingerprintError::InvalidLength {
                expected: 32,
                actual,
            })?;
        Ok(Self(arr))
    }

    /// Lowercase hexadecimal encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// SHA-256 over fields framed as `<byte length>:<bytes>`, so no field content
/// can shift a boundary.
pub(super) fn hash_framed<'a>(fields: impl IntoIterator<Item = &'a str>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.len().to_string().as_bytes());
        hasher.update(b":");
        hasher.update(field.as_bytes());
    }
    hasher.finalize().into()
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
