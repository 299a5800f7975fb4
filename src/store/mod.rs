//! Account records and the stores that hold them.

pub mod memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use std::future::Future;

use crate::auth::{Credential, Principal, StoreError, UserStore};

#[derive(Clone, Debug)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub credential: Credential,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal for User {
    fn id(&self) -> u64 {
        self.id
    }

    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub credential: Credential,
    pub created_at: DateTime<Utc>,
}

/// Account CRUD beyond what the auth core needs.
pub trait UserRepository: UserStore<Account = User> {
    /// # Errors
    /// `StoreError::Conflict` when the username or email is taken.
    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<User, StoreError>> + Send;

    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, StoreError>> + Send;

    /// Check the backing storage is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
