//! Salted PBKDF2-HMAC-SHA256 password digests.

use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

pub const SALT_LEN: usize = 8;
pub const DIGEST_LEN: usize = 32;

/// OWASP guidance for PBKDF2-HMAC-SHA256.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("system random source failed")]
    RandomSource(#[from] rand::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("salt must be {SALT_LEN} bytes long, got {0}")]
    SaltLength(usize),
    #[error("digest must be {DIGEST_LEN} bytes long, got {0}")]
    DigestLength(usize),
}

/// Salt and derived digest of a password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    salt: [u8; SALT_LEN],
    digest: [u8; DIGEST_LEN],
}

impl Credential {
    /// Rebuild a credential loaded from storage.
    ///
    /// # Errors
    /// Returns `CredentialError` if either part has the wrong length.
    pub fn from_parts(salt: &[u8], digest: &[u8]) -> Result<Self, CredentialError> {
        let salt: [u8; SALT_LEN] = salt
            .try_into()
            .map_err(|_| CredentialError::SaltLength(salt.len()))?;
        let digest: [u8; DIGEST_LEN] = digest
            .try_into()
            .map_err(|_| CredentialError::DigestLength(digest.len()))?;
        Ok(Self { salt, digest })
    }

    /// Credential no password verifies against, used to spend the same time
    /// on unknown usernames as on known ones.
    pub(crate) fn decoy() -> Self {
        Self {
            salt: [0u8; SALT_LEN],
            digest: [0u8; DIGEST_LEN],
        }
    }

    #[must_use]
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    #[must_use]
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    #[must_use]
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derive a credential for `password` with a fresh random salt.
    ///
    /// # Errors
    /// Returns `PasswordError::RandomSource` if the OS RNG is unavailable.
    pub fn derive(&self, password: &str) -> Result<Credential, PasswordError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt)?;
        Ok(Credential {
            salt,
            digest: self.digest(password, &salt),
        })
    }

    /// Whether `password` is the one `credential` was derived from.
    #[must_use]
    pub fn verify(&self, password: &str, credential: &Credential) -> bool {
        let check = self.digest(password, &credential.salt);
        constant_time_eq(&check, &credential.digest)
    }

    fn digest(&self, password: &str, salt: &[u8]) -> [u8; DIGEST_LEN] {
        let mut digest = [0u8; DIGEST_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut digest);
        digest
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

/// Byte comparison whose running time only depends on the lengths.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
