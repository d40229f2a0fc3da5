//! Port abstraction for one-way password hashing.
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::{PasswordHash, RawPassword};

use super::define_port_error;

define_port_error! {
    /// Errors raised by password hasher adapters.
    pub enum PasswordHashError {
        /// The hashing backend failed.
        Hashing { message: String } => "password hashing failed: {message}",
        /// The blocking worker running the hash was lost.
        WorkerLost { message: String } => "password hashing worker failed: {message}" => retryable,
    }
}

/// Slow, salted one-way hash. The algorithm is chosen by the adapter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password.
    async fn hash(&self, password: &RawPassword) -> Result<PasswordHash, PasswordHashError>;
}

/// Fast deterministic hasher for tests. Not suitable for real passwords.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePasswordHasher;

#[async_trait]
impl PasswordHasher for FixturePasswordHasher {
    async fn hash(&self, password: &RawPassword) -> Result<PasswordHash, PasswordHashError> {
        let digest = Sha256::digest(password.expose().as_bytes());
        Ok(PasswordHash::new(format!("fixture-sha256${}", hex::encode(digest))))
    }
}
