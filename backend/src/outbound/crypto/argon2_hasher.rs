//! Argon2id implementation of the `PasswordHasher` port.
//!
//! Hashing is deliberately slow, so it runs on Tokio's blocking pool rather
//! than on an executor thread.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, Version};
use async_trait::async_trait;
use rand::RngCore;
use tracing::instrument;
use zeroize::Zeroizing;

use crate::domain::ports::{PasswordHashError, PasswordHasher};
use crate::domain::{PasswordHash, RawPassword};

const SALT_LEN: usize = 16;

/// Argon2id hasher producing PHC-format strings.
#[derive(Debug, Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Argon2PasswordHasher {
    /// Hasher with the library's recommended cost parameters.
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    /// Hasher with explicit memory (KiB), iteration and lane costs.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordHashError::Hashing`] when the costs are outside the
    /// ranges Argon2 accepts.
    pub fn with_costs(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self, PasswordHashError> {
        let params = Params::new(memory_kib, iterations, lanes, None)
            .map_err(|err| PasswordHashError::hashing(err.to_string()))?;
        Ok(Self { params })
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_blocking(params: Params, password: &[u8]) -> Result<String, PasswordHashError> {
    let mut salt_bytes = [0_u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|err| PasswordHashError::hashing(err.to_string()))?;
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordHashError::hashing(err.to_string()))
}

#[async_trait]
impl PasswordHasher for Argon2PasswordHasher {
    #[instrument(name = "password.argon2", skip_all, err)]
    async fn hash(&self, password: &RawPassword) -> Result<PasswordHash, PasswordHashError> {
        let secret = Zeroizing::new(password.expose().as_bytes().to_vec());
        let params = self.params.clone();
        let encoded = tokio::task::spawn_blocking(move || hash_blocking(params, &secret))
            .await
            .map_err(|err| PasswordHashError::worker_lost(err.to_string()))??;
        Ok(PasswordHash::new(encoded))
    }
}
