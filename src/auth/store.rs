//! Account storage as seen by the auth core.

use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;

use super::{password::Credential, password::CredentialError, principal::Principal};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,
    #[error("account already exists")]
    Conflict,
    #[error("account was modified concurrently")]
    Stale,
    #[error("stored credential is malformed")]
    Corrupt(#[from] CredentialError),
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

pub trait UserStore: Send + Sync + 'static {
    type Account: Principal + Clone + Send + Sync + 'static;

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Self::Account, StoreError>> + Send;

    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Self::Account, StoreError>> + Send;

    fn find_by_id(&self, id: u64) -> impl Future<Output = Result<Self::Account, StoreError>> + Send;

    /// Replace the credential of `id` and set its `updated_at` to `changed_at`.
    ///
    /// With `unmodified_since`, the write happens atomically only if the
    /// account's `updated_at` is not later than that instant; otherwise
    /// `StoreError::Stale` is returned and nothing changes.
    fn update_password(
        &self,
        id: u64,
        credential: &Credential,
        changed_at: DateTime<Utc>,
        unmodified_since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
