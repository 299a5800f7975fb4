//! In-process account store, used when no database is configured.

use chrono::{DateTime, Utc};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;

use super::{NewUser, User, UserRepository};
use crate::auth::{Credential, StoreError, UserStore};

#[derive(Default)]
struct Inner {
    next_id: u64,
    users: BTreeMap<u64, User>,
}

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop an account, as if it had been deleted.
    pub async fn remove(&self, id: u64) -> Option<User> {
        self.inner.write().await.users.remove(&id)
    }

    async fn find(&self, predicate: impl Fn(&User) -> bool) -> Result<User, StoreError> {
        self.inner
            .read()
            .await
            .users
            .values()
            .find(|user| predicate(user))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

impl UserStore for MemoryUserStore {
    type Account = User;

    async fn find_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.find(|user| user.username == username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.find(|user| user.email == email).await
    }

    async fn find_by_id(&self, id: u64) -> Result<User, StoreError> {
        self.inner
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_password(
        &self,
        id: u64,
        credential: &Credential,
        changed_at: DateTime<Utc>,
        unmodified_since: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if unmodified_since.is_some_and(|bound| user.updated_at > bound) {
            return Err(StoreError::Stale);
        }
        user.credential = credential.clone();
        user.updated_at = changed_at;
        Ok(())
    }
}

impl UserRepository for MemoryUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .users
            .values()
            .any(|existing| existing.username == user.username || existing.email == user.email)
        {
            return Err(StoreError::Conflict);
        }

        inner.next_id += 1;
        let created = User {
            id: inner.next_id,
            username: user.username,
            email: user.email,
            credential: user.credential,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.inner.read().await.users.values().cloned().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
