//! Application state management

use crate::auth::jwt::{JwtConfig, JwtError, TokenService};
use crate::auth::password::PasswordHasher;
use crate::auth::repository::{MemoryUserStore, UserStore};
use crate::auth::service::AuthService;
use kinship_core::config::AppConfig;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Register, login, update and logout flows
    pub auth: AuthService,
    /// Backing user store
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Wire the auth services on top of a user store
    ///
    /// Fails when no signing secret is configured.
    pub fn new(config: AppConfig, users: Arc<dyn UserStore>) -> Result<Self, JwtError> {
        let tokens = TokenService::new(JwtConfig::from(&config.auth))?;
        let hasher = PasswordHasher::from_config(&config.auth);
        let auth = AuthService::new(users.clone(), tokens, hasher);

        Ok(Self {
            config,
            start_time: Instant::now(),
            auth,
            users,
        })
    }

    /// State backed by an in-memory store
    pub fn in_memory(config: AppConfig) -> Result<Self, JwtError> {
        Self::new(config, Arc::new(MemoryUserStore::new()))
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if the user store is reachable
    pub async fn is_ready(&self) -> bool {
        self.users.ping().await
    }
}
