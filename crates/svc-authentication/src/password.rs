//! Password hashing port and its default implementation.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A salted password digest as stored in the account table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPassword {
    salt: String,
    digest: [u8; 32],
}

/// Hashing strategy for stored passwords.
///
/// A trait seam so deployments can swap in a slower KDF without touching
/// the account logic.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password with a fresh salt.
    fn hash(&self, password: &str) -> StoredPassword;

    /// Check a plaintext password against a stored digest.
    fn verify(&self, password: &str, stored: &StoredPassword) -> bool;
}

/// Salted SHA-256. Salt is a fresh v4 UUID per password.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256PasswordHasher;

impl Sha256PasswordHasher {
    fn digest(salt: &str, password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }
}

impl PasswordHasher for Sha256PasswordHasher {
    fn hash(&self, password: &str) -> StoredPassword {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = Self::digest(&salt, password);
        StoredPassword { salt, digest }
    }

    fn verify(&self, password: &str, stored: &StoredPassword) -> bool {
        Self::digest(&stored.salt, password) == stored.digest
    }
}
