//! Login, logout and password endpoints.

use axum::{
    extract::{Extension, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    auth_error_response, error_response,
    types::{ChangePasswordForm, LoginForm, ResetPasswordForm, ResetRequestForm, UserOut},
    validated,
};
use crate::{
    auth::{
        middleware::{clear_session_cookie, session_cookie},
        AuthError, AuthManager,
    },
    store::{User, UserRepository},
};

/// `POST /auth`
#[instrument(skip_all)]
pub async fn login<S: UserRepository>(
    State(manager): State<Arc<AuthManager<S>>>,
    payload: Option<Json<LoginForm>>,
) -> Response {
    let form = match validated(payload) {
        Ok(form) => form,
        Err(response) => return response,
    };

    let user = match manager.authenticate(&form).await {
        Ok(user) => user,
        Err(err) => return auth_error_response(&err),
    };

    let cookie = manager
        .register_session(&user)
        .and_then(|token| manager.encode(&token));
    let cookie = match cookie {
        Ok(encoded) => session_cookie(manager.config(), &encoded),
        Err(err) => return auth_error_response(&err),
    };

    match cookie {
        Ok(cookie) => {
            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, cookie);
            (StatusCode::OK, headers, Json(UserOut::from(&user))).into_response()
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `DELETE /auth`
#[instrument(skip_all)]
pub async fn logout<S: UserRepository>(
    State(manager): State<Arc<AuthManager<S>>>,
    Extension(user): Extension<User>,
) -> Response {
    manager.remove_session(&user);

    let mut headers = HeaderMap::new();
    match clear_session_cookie(manager.config()) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }
    (StatusCode::NO_CONTENT, headers).into_response()
}

/// `GET /auth/me`
pub async fn me(Extension(user): Extension<User>) -> Json<UserOut> {
    Json(UserOut::from(&user))
}

/// `POST /auth/request_password_reset`
#[instrument(skip_all)]
pub async fn request_password_reset<S: UserRepository>(
    State(manager): State<Arc<AuthManager<S>>>,
    payload: Option<Json<ResetRequestForm>>,
) -> Response {
    let form = match validated(payload) {
        Ok(form) => form,
        Err(response) => return response,
    };

    match manager.request_password_reset(&form).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => auth_error_response(&err),
    }
}

/// `POST /auth/reset_password`
#[instrument(skip_all)]
pub async fn reset_password<S: UserRepository>(
    State(manager): State<Arc<AuthManager<S>>>,
    payload: Option<Json<ResetPasswordForm>>,
) -> Response {
    let form = match validated(payload) {
        Ok(form) => form,
        Err(response) => return response,
    };

    match manager.reset_password(&form).await {
        Ok(()) => StatusCode::OK.into_response(),
        // The token named an account that is gone; treat it like a bad token.
        Err(AuthError::NotFound) => error_response(StatusCode::FORBIDDEN, "invalid token"),
        Err(err) => auth_error_response(&err),
    }
}

/// `POST /auth/change_password`
#[instrument(skip_all)]
pub async fn change_password<S: UserRepository>(
    State(manager): State<Arc<AuthManager<S>>>,
    Extension(user): Extension<User>,
    payload: Option<Json<ChangePasswordForm>>,
) -> Response {
    let form = match validated(payload) {
        Ok(form) => form,
        Err(response) => return response,
    };

    match manager.set_password(&user, &form).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => auth_error_response(&err),
    }
}
