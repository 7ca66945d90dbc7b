//! Authentication service layer
//!
//! Provides business logic for registration, login, account update and
//! logout. Each operation is a sequence of store calls; an operation
//! reports success only after its last write has completed.
//!
//! Sessions are a single `session_id` per user. Two logins racing for the
//! same user both succeed and the later write wins.

use super::jwt::{Claims, TokenService, TokenSubject};
use super::middleware::AuthenticatedUser;
use super::models::{NewUser, User, UserPublic, UserRole};
use super::password::{fingerprint, PasswordHasher};
use super::repository::UserStore;
use crate::error::AppError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const MISSING_CREDENTIALS: &str = "Missing username or password";

/// User registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Account update request
///
/// The password is always re-hashed; email and role keep their stored
/// values when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub response: LoginResponse,
    pub user: UserPublic,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    hasher: PasswordHasher,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self {
            users,
            tokens,
            hasher,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new user with the least-privileged role
    ///
    /// # Errors
    ///
    /// * `Validation` - name or password missing
    /// * `Conflict` - a user with this name exists
    /// * `Database` / `Internal` - store or hashing failure
    pub async fn register(&self, request: RegisterRequest) -> Result<UserPublic, AppError> {
        let (name, password) = required_pair(request.name, request.password)?;

        if self.users.find_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = self.hasher.hash(&password).await?;

        let user = self
            .users
            .insert(NewUser {
                name,
                email: non_empty(request.email),
                password_hash,
                role: UserRole::default(),
            })
            .await?;

        tracing::debug!(user_id = %user.id, "User registered");
        Ok(user.to_public())
    }

    /// Check credentials, start a new session and issue its token
    ///
    /// The session id is persisted before the token is returned; if the
    /// write fails no token is handed out. A failed login leaves the
    /// stored user untouched.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, AppError> {
        let (name, password) = required_pair(request.username, request.password)?;

        let mut user = self
            .users
            .find_by_name(&name)
            .await?
            .ok_or_else(|| AppError::InvalidCredentials("User not found".to_string()))?;

        if !self.hasher.verify(&password, &user.password_hash).await {
            return Err(AppError::InvalidCredentials("Wrong password".to_string()));
        }

        let session_id = Uuid::new_v4().to_string();
        let password_fingerprint = fingerprint(&user.password_hash);
        let ttl = self.tokens.ttl_secs();

        let token = self
            .tokens
            .issue(
                &TokenSubject {
                    user_id: user.id,
                    name: &user.name,
                    role: user.role,
                    session_id: &session_id,
                    password_fingerprint: &password_fingerprint,
                },
                ttl,
            )
            .map_err(|e| AppError::Internal(format!("Failed to issue token: {e}")))?;

        user.session_id = Some(session_id);
        user.updated_at = Utc::now();
        self.users.save(&user).await?;

        Ok(LoginOutcome {
            response: LoginResponse {
                token,
                token_type: "Bearer".to_string(),
                expires_in: ttl,
            },
            user: user.to_public(),
        })
    }

    /// Replace an account's password and merge optional fields
    ///
    /// Callers may update their own account; admins may update any
    /// account and are the only ones allowed to change a role.
    pub async fn update_account(
        &self,
        actor: &AuthenticatedUser,
        request: UpdateAccountRequest,
    ) -> Result<UserPublic, AppError> {
        let (name, password) = required_pair(request.name, request.password)?;

        let role = match non_empty(request.role) {
            Some(raw) => Some(
                UserRole::parse(&raw)
                    .ok_or_else(|| AppError::Validation(format!("Unknown role: {raw}")))?,
            ),
            None => None,
        };

        if actor.name != name && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Cannot update another user's account".to_string(),
            ));
        }

        let existing = self
            .users
            .find_by_name(&name)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if role.is_some_and(|r| r != existing.role) && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators can change roles".to_string(),
            ));
        }

        let password_hash = self.hasher.hash(&password).await?;

        let updated = User {
            email: non_empty(request.email).or(existing.email.clone()),
            password_hash,
            role: role.unwrap_or(existing.role),
            updated_at: Utc::now(),
            ..existing
        };
        self.users.save(&updated).await?;

        Ok(updated.to_public())
    }

    /// End the session the token belongs to
    ///
    /// Steps, each required for the next:
    /// 1. a token is present (`Unauthorized` otherwise)
    /// 2. it decodes (`TokenFailure` otherwise, including expiry)
    /// 3. the named user exists (`NotFound`)
    /// 4. the password has not changed since issuance (`Unauthorized`)
    /// 5. the session id is cleared and saved
    ///
    /// The token's session id is not compared with the stored one, so
    /// repeating a logout with the same token succeeds.
    pub async fn logout(&self, token: Option<&str>) -> Result<UserPublic, AppError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("No token provided.".to_string()))?;

        let claims = self.tokens.decode(token).map_err(|e| {
            tracing::debug!(error = %e, "Logout token rejected");
            AppError::TokenFailure("Failed to authenticate token.".to_string())
        })?;

        let mut user = self
            .users
            .find_by_name(&claims.name)
            .await?
            .ok_or_else(|| AppError::NotFound("No user found.".to_string()))?;

        if fingerprint(&user.password_hash) != claims.pwd {
            return Err(AppError::Unauthorized("Invalid password.".to_string()));
        }

        user.session_id = None;
        user.updated_at = Utc::now();
        self.users.save(&user).await?;

        Ok(user.to_public())
    }

    /// Whether the token's session is still the one stored for its user
    pub async fn session_is_current(&self, claims: &Claims) -> Result<bool, AppError> {
        let user = self.users.find_by_name(&claims.name).await?;
        Ok(user.is_some_and(|u| {
            u.id.to_string() == claims.sub && u.session_id.as_deref() == Some(claims.sid.as_str())
        }))
    }

    /// Load the public view of a user by name
    pub async fn get_user(&self, name: &str) -> Result<UserPublic, AppError> {
        self.users
            .find_by_name(name)
            .await?
            .map(|u| u.to_public())
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

/// Treat absent and empty values alike
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required_pair(
    name: Option<String>,
    password: Option<String>,
) -> Result<(String, String), AppError> {
    match (non_empty(name), password.filter(|p| !p.is_empty())) {
        (Some(name), Some(password)) => Ok((name, password)),
        _ => Err(AppError::Validation(MISSING_CREDENTIALS.to_string())),
    }
}
