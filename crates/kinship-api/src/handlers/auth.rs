//! Account API handlers
//!
//! Registration, login, account update and logout. Each handler records an
//! audit event for the outcome and maps the flow's error to a response.
//! Bodies that are missing or fail to parse are answered as missing fields.

use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::auth::middleware::bearer_token;
use crate::auth::{
    AuthenticatedUser, LoginRequest, LoginResponse, RegisterRequest, UpdateAccountRequest,
    UserPublic,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Plain confirmation body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// Identity carried by the presented token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user_id: String,
    pub name: String,
    pub role: String,
    pub session_id: String,
}

/// Register a new user account
///
/// New users are assigned the `Viewer` role.
#[utoipa::path(
    post,
    path = "/user/register",
    tag = "user",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User created", body = MessageResponse),
        (status = 400, description = "Missing fields or user exists", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(request) = payload?;
    let ctx = AuditContext::from_headers(&headers);
    let name = request.name.clone().unwrap_or_default();

    match state.auth.register(request).await {
        Ok(user) => {
            audit_log(
                &AuditEvent::RegistrationSuccess {
                    user_id: user.id,
                    name: user.name,
                    role: user.role.to_string(),
                },
                &ctx,
            );
            Ok(MessageResponse::new("User created successfully"))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::RegistrationFailure {
                    name,
                    reason: e.to_string(),
                },
                &ctx,
            );
            Err(e)
        }
    }
}

/// Log in and receive a session token
///
/// Credentials travel in the JSON body of a GET request.
#[utoipa::path(
    get,
    path = "/user/login",
    tag = "user",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields or invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) = payload?;
    let ctx = AuditContext::from_headers(&headers);
    let name = request.username.clone().unwrap_or_default();

    match state.auth.login(request).await {
        Ok(outcome) => {
            audit_log(
                &AuditEvent::LoginSuccess {
                    user_id: outcome.user.id,
                    name: outcome.user.name,
                },
                &ctx,
            );
            Ok(Json(outcome.response))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::LoginFailure {
                    name,
                    reason: e.to_string(),
                },
                &ctx,
            );
            Err(e)
        }
    }
}

/// Replace the password and merge optional fields of an account
#[utoipa::path(
    put,
    path = "/user/update",
    tag = "user",
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "User updated", body = MessageResponse),
        (status = 400, description = "Missing fields", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Not allowed to update this account", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    payload: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(request) = payload?;
    let ctx = AuditContext::from_headers(&headers);
    let target = request.name.clone().unwrap_or_default();

    match state.auth.update_account(&actor, request).await {
        Ok(user) => {
            audit_log(
                &AuditEvent::AccountUpdated {
                    user_id: user.id,
                    name: user.name,
                    updated_by: actor.name,
                    role: user.role.to_string(),
                },
                &ctx,
            );
            Ok(MessageResponse::new("User updated successfully"))
        }
        Err(e @ AppError::Forbidden(_)) => {
            audit_log(
                &AuditEvent::AccessDenied {
                    user_id: actor.user_id,
                    name: actor.name,
                    resource: format!("user:{target}"),
                },
                &ctx,
            );
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// End the current session
///
/// Reads the token itself rather than going through the auth middleware.
#[utoipa::path(
    delete,
    path = "/user/logout",
    tag = "user",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "No token or password changed", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
        (status = 500, description = "Token could not be decoded", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    let ctx = AuditContext::from_headers(&headers);

    match state.auth.logout(bearer_token(&headers)).await {
        Ok(user) => {
            audit_log(
                &AuditEvent::Logout {
                    user_id: user.id,
                    name: user.name,
                },
                &ctx,
            );
            Ok(MessageResponse::new("User logged out successfully"))
        }
        Err(e) => {
            audit_log(
                &AuditEvent::LogoutRejected {
                    reason: e.to_string(),
                },
                &ctx,
            );
            Err(e)
        }
    }
}

/// Current user info from the token
#[utoipa::path(
    get,
    path = "/user/me",
    tag = "user",
    responses(
        (status = 200, description = "Token identity", body = MeResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user.user_id.to_string(),
        name: user.name,
        role: user.role.to_string(),
        session_id: user.session_id,
    })
}

/// Stored profile of the caller
#[utoipa::path(
    get,
    path = "/user/profile",
    tag = "user",
    responses(
        (status = 200, description = "Stored profile", body = UserPublic),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<UserPublic>, AppError> {
    Ok(Json(state.auth.get_user(&user.name).await?))
}
