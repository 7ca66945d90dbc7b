//! Authentication and authorization module
//!
//! This module provides session-token authentication with the following components:
//! - Password hashing with Argon2
//! - Token issuance and validation
//! - User storage (PostgreSQL or in-memory)
//! - Authentication service for register, login, update and logout
//! - Middleware gating protected routes

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;

pub use jwt::{Claims, JwtConfig, JwtError, TokenService, TokenSubject};
pub use middleware::{auth_middleware, bearer_token, AuthError, AuthenticatedUser};
pub use models::{NewUser, User, UserPublic, UserRole};
pub use password::{fingerprint, hash_password, verify_password, PasswordConfig, PasswordHasher};
pub use repository::{MemoryUserStore, PgUserStore, RepositoryError, UserStore};
pub use service::{
    AuthService, LoginOutcome, LoginRequest, LoginResponse, RegisterRequest, UpdateAccountRequest,
};
