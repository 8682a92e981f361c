use async_trait::async_trait;
use mongodb::{
    bson::{doc, oid::ObjectId, to_document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneOptions, IndexOptions},
    Collection, Database, IndexModel,
};

use super::{Projection, UserStore};
use crate::{error::UserError, models::User};

pub const USERS_COLLECTION: &str = "users";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoUserStore {
    collection: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<User>(USERS_COLLECTION),
        }
    }

    /// Creates the unique index on `email` the duplicate checks rely on.
    pub async fn ensure_indexes(&self) -> Result<(), UserError> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index, None).await?;
        log::info!("Ensured unique email index on {}", USERS_COLLECTION);
        Ok(())
    }

    fn find_options(projection: Projection) -> Option<FindOneOptions> {
        match projection {
            Projection::Default => Some(
                FindOneOptions::builder()
                    .projection(doc! { "password": 0 })
                    .build(),
            ),
            Projection::WithPassword => None,
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn map_write_error(err: mongodb::error::Error, user: &User) -> UserError {
    if is_duplicate_key(&err) {
        log::warn!("Rejected duplicate email for user {}", user.id);
        UserError::DuplicateEmail(user.email.clone())
    } else {
        UserError::Database(err)
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, user: &User) -> Result<(), UserError> {
        self.collection
            .insert_one(user, None)
            .await
            .map_err(|e| map_write_error(e, user))?;
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), UserError> {
        let mut fields = to_document(user)?;
        fields.remove("_id");

        let result = self
            .collection
            .update_one(doc! { "_id": user.id }, doc! { "$set": fields }, None)
            .await
            .map_err(|e| map_write_error(e, user))?;

        if result.matched_count == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: ObjectId,
        projection: Projection,
    ) -> Result<Option<User>, UserError> {
        Ok(self
            .collection
            .find_one(doc! { "_id": id }, Self::find_options(projection))
            .await?)
    }

    async fn find_by_email(
        &self,
        email: &str,
        projection: Projection,
    ) -> Result<Option<User>, UserError> {
        Ok(self
            .collection
            .find_one(doc! { "email": email.trim() }, Self::find_options(projection))
            .await?)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, UserError> {
        let result = self.collection.delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}
