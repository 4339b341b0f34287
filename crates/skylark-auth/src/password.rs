//! Credential hashing seam for the account adapter.
//!
//! Hashing is pluggable so deployments can swap parameters or back the
//! adapter with an external verifier. The default implementation is
//! Argon2id with per-password random salts in PHC string format.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher as _, PasswordVerifier as _};

use crate::error::{StoreError, StoreResult};

/// Upper bound on accepted password length, in bytes.
///
/// Hashing cost grows with input size; the account adapter rejects
/// anything longer before it reaches the hasher.
pub const MAX_PASSWORD_BYTES: usize = 512;

/// Hashes and verifies account passwords.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password into a self-describing hash string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if hashing fails.
    fn hash_password(&self, password: &str) -> StoreResult<String>;

    /// Verifies a plaintext password against a stored hash string.
    ///
    /// A mismatch is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the stored hash is malformed.
    fn verify_password(&self, password: &str, hash: &str) -> StoreResult<bool>;
}

/// Argon2id implementation of [`PasswordHasher`] with default parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2PasswordHasher;

impl PasswordHasher for Argon2PasswordHasher {
    fn hash_password(&self, password: &str) -> StoreResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| StoreError::storage(format!("password hashing failed: {err}")))
    }

    fn verify_password(&self, password: &str, hash: &str) -> StoreResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|err| StoreError::storage(format!("stored password hash is invalid: {err}")))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(StoreError::storage(format!(
                "password verification failed: {err}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify_password("hunter2", &hash).unwrap());
        assert!(!hasher.verify_password("hunter3", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = Argon2PasswordHasher;
        let first = hasher.hash_password("same-password").unwrap();
        let second = hasher.hash_password("same-password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let hasher = Argon2PasswordHasher;
        let err = hasher.verify_password("whatever", "not-a-phc-string");
        assert!(err.is_err());
    }
}
