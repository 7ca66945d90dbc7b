/// Authentication middleware for protecting routes
///
/// Extracts and validates the session token from the Authorization header.
/// On success, adds authenticated user information to request extensions.
use super::jwt::{Claims, JwtError};
use super::models::UserRole;
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Authenticated user information extracted from a token
///
/// This is added to request extensions by the auth middleware
/// and can be extracted in handlers using `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// User's unique identifier
    pub user_id: Uuid,
    /// Login name
    pub name: String,
    /// Role at the time the token was issued
    pub role: UserRole,
    /// Session the token belongs to
    pub session_id: String,
    /// JWT token ID
    pub jti: String,
}

impl AuthenticatedUser {
    /// Check if user has admin role
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: Uuid::parse_str(&claims.sub).unwrap_or_else(|_| Uuid::nil()),
            name: claims.name,
            role: claims.role,
            session_id: claims.sid,
            jti: claims.jti,
        }
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),

    #[error("Session is no longer active")]
    SessionEnded,

    #[error("Session lookup failed: {0}")]
    Lookup(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingAuthHeader => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing Authorization header",
            ),
            AuthError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or expired token",
            ),
            AuthError::SessionEnded => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Session is no longer active",
            ),
            AuthError::Lookup(e) => {
                tracing::error!(error = %e, "Session lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error",
                )
            }
        };

        (status, Json(crate::error::ApiError::new(code, message))).into_response()
    }
}

/// Extract the token from the Authorization header
///
/// Accepts both `Bearer <token>` and a bare `<token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };

    (!token.is_empty()).then_some(token)
}

/// Authentication middleware that requires a valid session token
///
/// This middleware:
/// 1. Extracts the token from the Authorization header
/// 2. Validates the signature, issuer and expiration
/// 3. Optionally checks the token's session is still the stored one
/// 4. Adds AuthenticatedUser to request extensions
///
/// # Usage
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use kinship_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let ctx = AuditContext::from_headers(request.headers());

    let Some(token) = bearer_token(request.headers()) else {
        audit_log(
            &AuditEvent::InvalidToken {
                reason: "Missing Authorization header".to_string(),
            },
            &ctx,
        );
        return Err(AuthError::MissingAuthHeader);
    };

    let claims = match state.auth.tokens().decode(token) {
        Ok(c) => c,
        Err(e) => {
            audit_log(
                &AuditEvent::InvalidToken {
                    reason: e.to_string(),
                },
                &ctx,
            );
            return Err(AuthError::InvalidToken(e));
        }
    };

    if state.config.auth.enforce_session_check {
        let current = state
            .auth
            .session_is_current(&claims)
            .await
            .map_err(|e| AuthError::Lookup(e.to_string()))?;

        if !current {
            audit_log(
                &AuditEvent::InvalidToken {
                    reason: "Session is no longer active".to_string(),
                },
                &ctx,
            );
            return Err(AuthError::SessionEnded);
        }
    }

    request
        .extensions_mut()
        .insert(AuthenticatedUser::from(claims));

    Ok(next.run(request).await)
}
