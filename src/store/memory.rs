use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::{Projection, UserStore};
use crate::{error::UserError, models::User};

/// In-process store with the same uniqueness and projection rules as the
/// MongoDB collection. Used by the tests and for running without a database.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<ObjectId, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn project(user: &User, projection: Projection) -> User {
    let mut user = user.clone();
    if projection == Projection::Default {
        user.strip_password();
    }
    user
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &User) -> Result<(), UserError> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(UserError::DuplicateEmail(user.email.clone()));
        }
        let mut stored = user.clone();
        stored.mark_persisted();
        users.insert(user.id, stored);
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), UserError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| existing.id != user.id && existing.email == user.email)
        {
            return Err(UserError::DuplicateEmail(user.email.clone()));
        }

        let existing = users.get_mut(&user.id).ok_or(UserError::NotFound)?;
        let mut stored = user.clone();
        if stored.password_hash().is_none() {
            if let Some(hash) = existing.password_hash() {
                stored.restore_password_hash(hash.to_string());
            }
        }
        stored.mark_persisted();
        *existing = stored;
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: ObjectId,
        projection: Projection,
    ) -> Result<Option<User>, UserError> {
        let users = self.users.read().await;
        Ok(users.get(&id).map(|user| project(user, projection)))
    }

    async fn find_by_email(
        &self,
        email: &str,
        projection: Projection,
    ) -> Result<Option<User>, UserError> {
        let email = email.trim();
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| user.email == email)
            .map(|user| project(user, projection)))
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, UserError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}
