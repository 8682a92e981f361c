use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::{error::UserError, models::User};

pub mod memory;
pub mod mongo;

pub use memory::MemoryUserStore;
pub use mongo::MongoUserStore;

/// Which fields a read returns. `password` is left out unless asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    Default,
    WithPassword,
}

/// Raw persistence for user documents.
///
/// Implementations must reject a second document with the same `email` with
/// [`UserError::DuplicateEmail`], and must never clear a stored hash on
/// update when the incoming user carries none.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &User) -> Result<(), UserError>;

    async fn update(&self, user: &User) -> Result<(), UserError>;

    async fn find_by_id(
        &self,
        id: ObjectId,
        projection: Projection,
    ) -> Result<Option<User>, UserError>;

    async fn find_by_email(
        &self,
        email: &str,
        projection: Projection,
    ) -> Result<Option<User>, UserError>;

    async fn delete(&self, id: ObjectId) -> Result<bool, UserError>;
}
