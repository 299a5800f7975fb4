//! Account creation and lookup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::{auth_error_response, error_response, types::NewUserForm, types::UserOut, validated};
use crate::{
    auth::{AuthManager, StoreError},
    store::{NewUser, UserRepository},
};

fn store_error_response(err: &StoreError) -> Response {
    match err {
        StoreError::NotFound => error_response(StatusCode::NOT_FOUND, "user not found"),
        StoreError::Conflict => error_response(StatusCode::CONFLICT, "user already exists"),
        StoreError::Stale | StoreError::Unavailable(_) | StoreError::Corrupt(_) => {
            error!("Store failure: {err}");
            error_response(StatusCode::FAILED_DEPENDENCY, "dependency failure")
        }
    }
}

/// `POST /user`
#[instrument(skip_all)]
pub async fn create<S: UserRepository>(
    State(manager): State<Arc<AuthManager<S>>>,
    payload: Option<Json<NewUserForm>>,
) -> Response {
    let form = match validated(payload) {
        Ok(form) => form,
        Err(response) => return response,
    };

    let credential = match manager.credential_for(&form.password).await {
        Ok(credential) => credential,
        Err(err) => return auth_error_response(&err),
    };

    let new_user = NewUser {
        username: form.username,
        email: form.email,
        credential,
        created_at: manager.now(),
    };
    match manager.store().create_user(new_user).await {
        Ok(user) => (StatusCode::CREATED, Json(UserOut::from(&user))).into_response(),
        Err(err) => store_error_response(&err),
    }
}

/// `GET /user`
#[instrument(skip_all)]
pub async fn list<S: UserRepository>(State(manager): State<Arc<AuthManager<S>>>) -> Response {
    match manager.store().list_users().await {
        Ok(users) => Json(users.iter().map(UserOut::from).collect::<Vec<_>>()).into_response(),
        Err(err) => store_error_response(&err),
    }
}

/// `GET /user/:user_id`
#[instrument(skip_all)]
pub async fn get<S: UserRepository>(
    State(manager): State<Arc<AuthManager<S>>>,
    Path(user_id): Path<String>,
) -> Response {
    let Ok(user_id) = user_id.parse::<u64>() else {
        return error_response(StatusCode::BAD_REQUEST, "invalid user id");
    };

    match manager.store().find_by_id(user_id).await {
        Ok(user) => Json(UserOut::from(&user)).into_response(),
        Err(err) => store_error_response(&err),
    }
}
