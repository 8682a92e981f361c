use std::{env, fmt, time::Duration};

use mongodb::{bson::doc, Client, Database};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is malformed: {reason}")]
    Malformed { name: &'static str, reason: String },
}

/// Signing settings for the bearer tokens handed out at registration and login.
///
/// Only constructible from a non-blank secret and a positive lifetime.
#[derive(Clone)]
pub struct JwtConfig {
    secret: String,
    expires_in: Duration,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expires_in: Duration) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(ConfigError::Malformed {
                name: "JWT_SECRET_KEY",
                reason: "secret is blank".to_string(),
            });
        }
        if expires_in.is_zero() {
            return Err(ConfigError::Malformed {
                name: "JWT_EXPIRE",
                reason: "expiration must be positive".to_string(),
            });
        }
        Ok(Self { secret, expires_in })
    }

    /// Reads `JWT_SECRET_KEY` and `JWT_EXPIRE`.
    ///
    /// A unitless `JWT_EXPIRE` is a number of seconds, not milliseconds as in
    /// Node's `ms` format: write `120000ms` rather than `120000`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = env::var("JWT_SECRET_KEY").map_err(|_| ConfigError::Missing("JWT_SECRET_KEY"))?;
        let expire = env::var("JWT_EXPIRE").map_err(|_| ConfigError::Missing("JWT_EXPIRE"))?;
        let expires_in = parse_duration(&expire).map_err(|reason| ConfigError::Malformed {
            name: "JWT_EXPIRE",
            reason,
        })?;
        Self::new(secret, expires_in)
    }

    pub(crate) fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Parses time spans such as `7d`, `12h`, `1.5h`, `2 days` or `500ms`.
/// A bare number is a count of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (amount, unit) = raw.split_at(split);
    let amount: f64 = amount
        .parse()
        .map_err(|_| format!("`{raw}` does not start with a number"))?;

    let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 0.001,
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "d" | "day" | "days" => 86_400.0,
        "w" | "week" | "weeks" => 604_800.0,
        "y" | "yr" | "yrs" | "year" | "years" => 31_557_600.0,
        other => return Err(format!("unknown time unit `{other}`")),
    };

    let seconds = amount * seconds_per_unit;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("`{raw}` is not a positive duration"));
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("`{raw}` is out of range: {e}"))
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub uri: String,
    pub name: String,
}

impl DatabaseSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            uri: env::var("MONGODB_URI").map_err(|_| ConfigError::Missing("MONGODB_URI"))?,
            name: env::var("DATABASE_NAME").map_err(|_| ConfigError::Missing("DATABASE_NAME"))?,
        })
    }
}

pub async fn init_database(settings: &DatabaseSettings) -> mongodb::error::Result<Database> {
    log::info!("Connecting to MongoDB database: {}", settings.name);

    let client = Client::with_uri_str(&settings.uri).await?;
    let database = client.database(&settings.name);

    match database.run_command(doc! { "ping": 1 }, None).await {
        Ok(_) => log::info!("Successfully connected to MongoDB"),
        Err(e) => log::error!("Failed to ping database: {}", e),
    }

    Ok(database)
}

pub fn get_port() -> Result<u16, ConfigError> {
    env::var("PORT")
        .map_err(|_| ConfigError::Missing("PORT"))?
        .parse()
        .map_err(|_| ConfigError::Malformed {
            name: "PORT",
            reason: "must be a number".to_string(),
        })
}
