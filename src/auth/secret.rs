//! Server-wide HMAC key used to sign session and reset tokens.

use base64ct::{Base64, Encoding};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use std::fmt;
use thiserror::Error;

/// Required length of the decoded server secret.
pub const SECRET_LEN: usize = 64;

/// Fatal startup errors caused by a bad server secret.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("server secret is not valid base64")]
    SecretEncoding,
    #[error("server secret must be {SECRET_LEN} bytes long, got {0}")]
    SecretLength(usize),
}

/// Decoded server secret.
///
/// Built once at startup and handed to the token codec; it never changes for
/// the lifetime of the process.
pub struct ServerSecret(SecretSlice<u8>);

impl ServerSecret {
    /// Decode a standard-alphabet, padded base64 secret.
    ///
    /// # Errors
    /// Returns `ConfigurationError` if the value is not base64 or does not
    /// decode to exactly [`SECRET_LEN`] bytes.
    pub fn from_base64(encoded: &SecretString) -> Result<Self, ConfigurationError> {
        let bytes = Base64::decode_vec(encoded.expose_secret().trim())
            .map_err(|_| ConfigurationError::SecretEncoding)?;
        Self::from_bytes(bytes)
    }

    /// # Errors
    /// Returns `ConfigurationError::SecretLength` unless `bytes` is exactly
    /// [`SECRET_LEN`] long.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ConfigurationError> {
        if bytes.len() != SECRET_LEN {
            return Err(ConfigurationError::SecretLength(bytes.len()));
        }
        Ok(Self(SecretSlice::from(bytes)))
    }

    pub(crate) fn key(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerSecret([REDACTED])")
    }
}
