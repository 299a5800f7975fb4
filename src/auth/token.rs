//! Signed, self-describing bearer tokens.
//!
//! A token is the JSON document
//! `{"info": {"user_id", "type", "issued_at", "expires_at"}, "verification_code"}`
//! encoded with standard padded base64. The verification code is the base64
//! HMAC-SHA256 of the serialized `info` under the server secret, so validity is
//! recomputed from the token bytes alone and nothing is stored server-side.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::secret::ServerSecret;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is not valid base64")]
    Encoding,
    #[error("token structure is invalid")]
    Json(#[from] serde_json::Error),
    #[error("unknown token kind {0}")]
    UnknownKind(u8),
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

/// What a token may be used for; signed into the token to prevent cross-use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TokenKind {
    Session = 1,
    Reset = 2,
}

impl From<TokenKind> for u8 {
    fn from(kind: TokenKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for TokenKind {
    type Error = TokenError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Session),
            2 => Ok(Self::Reset),
            other => Err(TokenError::UnknownKind(other)),
        }
    }
}

/// Signed part of a token. Field order is the serialization order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(rename = "user_id")]
    pub subject_id: u64,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub info: TokenInfo,
    pub verification_code: String,
}

/// Signs and checks tokens with the server secret.
#[derive(Debug)]
pub struct TokenCodec {
    secret: ServerSecret,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: ServerSecret) -> Self {
        Self { secret }
    }

    /// Build a token for `subject_id` valid from `issued_at` for `ttl`.
    ///
    /// # Errors
    /// Returns `TokenError::Json` if the info cannot be serialized.
    pub fn sign(
        &self,
        subject_id: u64,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Result<Token, TokenError> {
        let info = TokenInfo {
            subject_id,
            kind,
            issued_at,
            expires_at: issued_at + ttl,
        };
        let code = self.mac(&info)?.finalize().into_bytes();
        Ok(Token {
            info,
            verification_code: Base64::encode_string(&code),
        })
    }

    /// Serialize a token for transport in a cookie, header or email.
    ///
    /// # Errors
    /// Returns `TokenError::Json` if the token cannot be serialized.
    pub fn encode(&self, token: &Token) -> Result<String, TokenError> {
        let json = serde_json::to_vec(token)?;
        Ok(Base64::encode_string(&json))
    }

    /// Parse a transported token. This does not verify it.
    ///
    /// # Errors
    /// Returns `TokenError::Encoding` or `TokenError::Json` for malformed input.
    pub fn decode(&self, encoded: &str) -> Result<Token, TokenError> {
        let json = Base64::decode_vec(encoded.trim()).map_err(|_| TokenError::Encoding)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Check signature and expiry against `now`.
    ///
    /// # Errors
    /// Returns `TokenError::InvalidSignature` when the verification code was
    /// not produced by this secret for this info, and `TokenError::Expired`
    /// once `now` is past `expires_at`.
    pub fn check(&self, token: &Token, now: DateTime<Utc>) -> Result<(), TokenError> {
        let code = Base64::decode_vec(&token.verification_code)
            .map_err(|_| TokenError::InvalidSignature)?;

        self.mac(&token.info)?
            .verify_slice(&code)
            .map_err(|_| TokenError::InvalidSignature)?;

        if now > token.info.expires_at {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    #[must_use]
    pub fn verify(&self, token: &Token, now: DateTime<Utc>) -> bool {
        self.check(token, now).is_ok()
    }

    fn mac(&self, info: &TokenInfo) -> Result<HmacSha256, TokenError> {
        let payload = serde_json::to_vec(info)?;
        // HMAC accepts keys of any length.
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.key()) else {
            return Err(TokenError::InvalidSignature);
        };
        mac.update(&payload);
        Ok(mac)
    }
}
