use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{config::JwtConfig, error::UserError, models::user::User};

/// Payload of the bearer tokens issued to users.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenClaims {
    /// Hex form of the user's `_id`.
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

impl User {
    /// Signs an HS256 token carrying this user's id, valid for the configured lifetime.
    pub fn generate_json_web_token(&self, config: &JwtConfig) -> Result<String, UserError> {
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(config.expires_in().as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            id: self.id.to_hex(),
            iat: now,
            exp: now.saturating_add(lifetime.max(1)),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret()),
        )?;
        log::debug!("issued token for user {}", claims.id);
        Ok(token)
    }
}
