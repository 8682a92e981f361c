use serde::Serialize;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::config::ConfigError;

/// A single failed constraint, addressed by its document path (`profileImage.url`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("validation failed: {}", describe(.0))]
    Validation(Vec<FieldError>),
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("a user with email {0} already exists")]
    DuplicateEmail(String),
    #[error("password was not loaded for this user")]
    PasswordNotLoaded,
    #[error("user not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("document mapping failed: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl UserError {
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            UserError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<ValidationErrors> for UserError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = Vec::new();
        flatten(None, &errors, &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        UserError::Validation(fields)
    }
}

fn flatten(prefix: Option<&str>, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (name, kind) in errors.errors() {
        // top-level keys come from Rust field names; stored documents use camelCase
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => camel_case(name),
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|error| FieldError {
                    field: path.clone(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string()),
                }));
            }
            ValidationErrorsKind::Struct(nested) => flatten(Some(path.as_str()), nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    let item = format!("{path}.{index}");
                    flatten(Some(item.as_str()), nested, out);
                }
            }
        }
    }
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
