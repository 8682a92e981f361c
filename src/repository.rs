use mongodb::bson::oid::ObjectId;

use crate::{
    error::UserError,
    models::{NewUser, User},
    store::{Projection, UserStore},
};

/// Write path for users: every insert and update goes through
/// `User::prepare_for_write` first, off the async executor.
pub struct UserRepository<S> {
    store: S,
}

impl<S: UserStore> UserRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn register(&self, new_user: NewUser) -> Result<User, UserError> {
        let mut user = User::from(new_user);
        self.save(&mut user).await?;
        log::info!("Registered user {} as {}", user.id, user.role);
        Ok(user)
    }

    /// Validates, hashes a modified password, then inserts or updates.
    /// `user` is only touched once the store accepted the write.
    pub async fn save(&self, user: &mut User) -> Result<(), UserError> {
        let mut staged = user.clone();
        let mut staged = tokio::task::spawn_blocking(move || {
            staged.prepare_for_write()?;
            Ok::<_, UserError>(staged)
        })
        .await??;

        if staged.is_new() {
            self.store.insert(&staged).await?;
            staged.mark_persisted();
        } else {
            self.store.update(&staged).await?;
        }

        *user = staged;
        Ok(())
    }

    pub async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, UserError> {
        self.store.find_by_id(id, Projection::Default).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        self.store.find_by_email(email, Projection::Default).await
    }

    /// Loads a user together with the password hash, for credential checks.
    pub async fn find_for_login(&self, email: &str) -> Result<Option<User>, UserError> {
        self.store.find_by_email(email, Projection::WithPassword).await
    }

    pub async fn delete(&self, id: ObjectId) -> Result<(), UserError> {
        if self.store.delete(id).await? {
            log::info!("Deleted user {}", id);
            Ok(())
        } else {
            Err(UserError::NotFound)
        }
    }
}
