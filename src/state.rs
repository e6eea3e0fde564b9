use chrono::Duration;
use std::sync::Arc;

use crate::auth::{public::PublicEndpoints, token::TokenService};
use crate::config::{Config, ConfigError};
use crate::store::{MemoryStore, TaskStore, UserStore};

/// Collaborators shared by every handler and by `AuthMiddleware`.
///
/// Registered once as `web::Data<AppState>`; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub tokens: TokenService,
    pub public_endpoints: PublicEndpoints,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        tokens: TokenService,
        public_endpoints: PublicEndpoints,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            tasks,
            tokens,
            public_endpoints,
            bcrypt_cost,
        }
    }

    /// Wires token, allowlist and hashing settings from `config` around the given stores.
    pub fn from_config<S>(config: &Config, store: Arc<S>) -> Result<Self, ConfigError>
    where
        S: UserStore + TaskStore + 'static,
    {
        let public_endpoints = PublicEndpoints::parse(&config.public_endpoints)?;
        let lifetime = Duration::try_seconds(config.jwt_expiration_secs)
            .filter(|lifetime| *lifetime > Duration::zero())
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "JWT_EXPIRATION_SECS",
                    config.jwt_expiration_secs.to_string(),
                )
            })?;
        let tokens = TokenService::new(&config.jwt_secret, lifetime);
        Ok(Self::new(
            store.clone(),
            store,
            tokens,
            public_endpoints,
            config.bcrypt_cost,
        ))
    }

    /// A state over a fresh `MemoryStore`.
    pub fn in_memory(config: &Config) -> Result<Self, ConfigError> {
        Self::from_config(config, Arc::new(MemoryStore::new()))
    }
}
