use crate::{Error, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::Argon2;
use log::warn;
use std::fmt::Debug;

/// Hashing and verification of secrets.
pub trait PasswordHasher: Debug + Send + Sync {
    /// Produce a salted one-way digest of `secret`.
    /// Every call draws a fresh salt, so digests of the same secret differ and must never be compared directly.
    fn hash(&self, secret: &str) -> Result<String>;

    /// Returns true if `secret` matches `digest`.
    /// A malformed digest never matches.
    fn verify(&self, digest: &str, secret: &str) -> bool;
}

/// Handles password hashing and verification using Argon2id with default parameters.
///
/// Digests are PHC strings, embedding algorithm, parameters and salt.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    /// Creates a new password hasher instance.
    pub fn new() -> Self {
        Self
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| Error::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify(&self, digest: &str, secret: &str) -> bool {
        let parsed_hash = match PasswordHash::new(digest) {
            Ok(parsed_hash) => parsed_hash,
            Err(e) => {
                warn!("Refusing to verify against malformed password digest: {e}");
                return false;
            }
        };

        match Argon2::default().verify_password(secret.as_bytes(), &parsed_hash) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                warn!("Password verification failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = Argon2Hasher::new();
        let digest = hasher.hash("b4l0u").unwrap();
        assert!(hasher.verify(&digest, "b4l0u"));
        assert!(!hasher.verify(&digest, "b4l0U"));
        assert!(!hasher.verify(&digest, ""));
    }

    #[test]
    fn test_salt_is_fresh() {
        let hasher = Argon2Hasher::new();
        let first = hasher.hash("t4rt1fl3tt3").unwrap();
        let second = hasher.hash("t4rt1fl3tt3").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify(&first, "t4rt1fl3tt3"));
        assert!(hasher.verify(&second, "t4rt1fl3tt3"));
    }

    #[test]
    fn test_malformed_digest() {
        let hasher = Argon2Hasher::new();
        assert!(!hasher.verify("not a digest", "anything"));
        assert!(!hasher.verify("", ""));
    }
}
