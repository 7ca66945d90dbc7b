//! Kinship Core - shared configuration
//!
//! Configuration is loaded once at process start and handed to the
//! services that need it; nothing in this crate holds global state.

pub mod config;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};
