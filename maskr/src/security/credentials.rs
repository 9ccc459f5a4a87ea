//! Argon2id hashing for passwords and one-time codes.

use super::errors::{CredentialError, CredentialResult};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hashes and verifies secrets with Argon2id and a random per-hash salt
///
/// The PHC string produced by [`hash`](Self::hash) embeds algorithm, parameters and
/// salt, so hashes made with different parameters still verify.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    /// Hasher with the Argon2id defaults
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Hasher with explicit cost parameters
    ///
    /// # Arguments
    ///
    /// * `memory_kib` - Memory cost in KiB
    /// * `iterations` - Time cost
    /// * `parallelism` - Lanes
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> CredentialResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| CredentialError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a secret into a PHC string
    pub fn hash(&self, secret: &str) -> CredentialResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        Ok(self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?
            .to_string())
    }

    /// Check a secret against a stored hash
    ///
    /// A malformed stored hash never matches.
    pub fn verify(&self, secret: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            log::warn!("Stored credential hash is malformed");
            return false;
        };

        self.argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}
