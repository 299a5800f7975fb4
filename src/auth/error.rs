use thiserror::Error;

use super::{password::PasswordError, store::StoreError, token::TokenError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of auth manager operations.
///
/// Callers map these to responses; the messages never carry secret material
/// and the authentication failures do not say which check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("forbidden")]
    Forbidden,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("not found")]
    NotFound,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("dependency failure: {0}")]
    DependencyFailure(BoxError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl AuthError {
    pub(crate) fn dependency(err: impl Into<BoxError>) -> Self {
        Self::DependencyFailure(err.into())
    }
}
