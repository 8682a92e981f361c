pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod store;

pub use error::{FieldError, UserError};
pub use models::{NewUser, PublicUser, Role, User, UserUpdate};
pub use repository::UserRepository;
