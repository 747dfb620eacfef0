//! Password hashing with Argon2id
//!
//! Every hash gets its own random salt and is stored as a PHC string, so the
//! parameters travel with the hash and verification needs nothing else.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
    password_hash::SaltString,
};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

const DUMMY_PASSWORD: &str = "dummy-password-for-unknown-users";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Salted, adaptive one-way password hashing
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: Arc<OnceLock<String>>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::with_params(Params::default())
    }
}

impl PasswordHasher {
    /// Hasher with explicit Argon2id cost parameters
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check `password` against a stored PHC hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
        Ok(self.argon2.verify_password(password.as_bytes(), &parsed).is_ok())
    }

    /// Spend the same work as a real verification when there is no user to
    /// verify against. Always reports a mismatch.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let hash = match self.dummy_hash.get() {
            Some(hash) => hash,
            None => match self.hash(DUMMY_PASSWORD) {
                Ok(hash) => self.dummy_hash.get_or_init(|| hash),
                Err(_) => return false,
            },
        };
        let _ = self.verify(password, hash);
        false
    }
}
