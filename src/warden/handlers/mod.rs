pub mod auth;
pub mod health;
pub mod types;
pub mod users;
pub mod validation;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;
use validation::{FieldErrors, Validate};

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Parse-level problems and field errors both answer 400.
pub(crate) fn validated<T: Validate>(payload: Option<Json<T>>) -> Result<T, Response> {
    let Some(Json(form)) = payload else {
        return Err(error_response(StatusCode::BAD_REQUEST, "Missing payload"));
    };
    form.validate()
        .map_err(|errors: FieldErrors| (StatusCode::BAD_REQUEST, Json(errors)).into_response())?;
    Ok(form)
}

/// Default mapping of auth failures to responses.
pub(crate) fn auth_error_response(err: &AuthError) -> Response {
    match err {
        AuthError::InvalidCredentials
        | AuthError::Forbidden
        | AuthError::InvalidToken
        | AuthError::TokenExpired => error_response(StatusCode::FORBIDDEN, &err.to_string()),
        AuthError::NotFound => error_response(StatusCode::NOT_FOUND, &err.to_string()),
        AuthError::PasswordMismatch => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "passwordAgain": err.to_string() })),
        )
            .into_response(),
        AuthError::DependencyFailure(source) => {
            error!("Dependency failure: {source}");
            error_response(StatusCode::FAILED_DEPENDENCY, "dependency failure")
        }
        AuthError::Password(_) | AuthError::Token(_) => {
            error!("Auth failure: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
