//! Session cookie handling and the request filter guarding authenticated routes.

use axum::{
    extract::{Request, State},
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{fmt, str::FromStr, sync::Arc};
use tracing::error;

use super::{error::AuthError, manager::AuthConfig, manager::AuthManager, store::UserStore};

pub const SESSION_COOKIE_NAME: &str = "user_session";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        })
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(format!("invalid SameSite value: {other}")),
        }
    }
}

/// Resolve the session token of the request and expose its account to the
/// handler as an `Extension<S::Account>`.
///
/// Requests without a valid session get `403 Forbidden` and never reach the
/// handler. When the store cannot be queried the answer is
/// `424 Failed Dependency`, so clients can tell an outage from a logout.
pub async fn require_session<S: UserStore>(
    State(manager): State<Arc<AuthManager<S>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_session_token(request.headers()) else {
        return StatusCode::FORBIDDEN.into_response();
    };

    match manager.retrieve_session(&token).await {
        Ok(account) => {
            request.extensions_mut().insert(account);
            next.run(request).await
        }
        Err(AuthError::DependencyFailure(err)) => {
            error!("Failed to resolve session: {err}");
            StatusCode::FAILED_DEPENDENCY.into_response()
        }
        Err(_) => StatusCode::FORBIDDEN.into_response(),
    }
}

/// Build the `Set-Cookie` value carrying an encoded session token.
///
/// # Errors
/// Returns `InvalidHeaderValue` if the token contains bytes not allowed in a
/// header.
pub fn session_cookie(config: &AuthConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    cookie(config, token, config.session_ttl_seconds())
}

/// Build the `Set-Cookie` value that makes the client drop its session.
///
/// # Errors
/// Returns `InvalidHeaderValue` if the header cannot be built.
pub fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    cookie(config, "", 0)
}

fn cookie(config: &AuthConfig, value: &str, max_age: u32) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite={}; Max-Age={max_age}",
        config.cookie_same_site()
    );
    // Browsers drop SameSite=None cookies that are not Secure.
    if config.cookie_secure() || config.cookie_same_site() == SameSite::None {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Session token from the `user_session` cookie, or else from an
/// `Authorization: Bearer` header.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie_token(headers).or_else(|| extract_bearer_token(headers))
}

fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
