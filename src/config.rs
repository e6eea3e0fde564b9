use std::env;

use crate::auth::public::DEFAULT_PUBLIC_ENDPOINTS;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: i64,
    pub bcrypt_cost: u32,
    pub public_endpoints: String,
    pub cors_allowed_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let bcrypt_cost = parse_or(&get, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid("BCRYPT_COST", bcrypt_cost.to_string()));
        }

        let jwt_expiration_secs = parse_or(&get, "JWT_EXPIRATION_SECS", 60 * 60 * 24)?;
        if jwt_expiration_secs <= 0
            || chrono::Duration::try_seconds(jwt_expiration_secs).is_none()
        {
            return Err(ConfigError::Invalid(
                "JWT_EXPIRATION_SECS",
                jwt_expiration_secs.to_string(),
            ));
        }

        Ok(Self {
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            server_port: parse_or(&get, "SERVER_PORT", 8080)?,
            server_host: get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            jwt_secret,
            jwt_expiration_secs,
            bcrypt_cost,
            public_endpoints: get("PUBLIC_ENDPOINTS")
                .unwrap_or_else(|| DEFAULT_PUBLIC_ENDPOINTS.to_string()),
            cors_allowed_origin: get("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}
