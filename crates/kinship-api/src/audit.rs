//! Security audit logging for authentication events
//!
//! All audit events are logged at INFO level (WARN for rejected tokens)
//! with the "audit" target, so they can be filtered and routed separately
//! from application logs:
//!
//! ```text
//! RUST_LOG=audit=info,kinship_api=warn
//! ```
//!
//! Events never carry passwords, hashes or tokens.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful user login; a new session was recorded
    LoginSuccess { user_id: Uuid, name: String },

    /// Failed login attempt
    LoginFailure { name: String, reason: String },

    /// Session cleared
    Logout { user_id: Uuid, name: String },

    /// Logout refused before the session was cleared
    LogoutRejected { reason: String },

    /// Successful user registration
    RegistrationSuccess {
        user_id: Uuid,
        name: String,
        role: String,
    },

    /// Failed registration attempt
    RegistrationFailure { name: String, reason: String },

    /// Account details (and password) replaced
    AccountUpdated {
        user_id: Uuid,
        name: String,
        updated_by: String,
        role: String,
    },

    /// Authenticated caller lacked permission
    AccessDenied {
        user_id: Uuid,
        name: String,
        resource: String,
    },

    /// Invalid, expired or stale token presented
    InvalidToken { reason: String },
}

/// Request metadata attached to every audit record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditContext {
    /// Client IP address (from proxy headers)
    pub ip_address: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event with structured fields
pub fn audit_log(event: &AuditEvent, ctx: &AuditContext) {
    // Serialize event to JSON for log aggregators
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess { user_id, name } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                name = %name,
                ip_address = ?ctx.ip_address,
                user_agent = ?ctx.user_agent,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure { name, reason } => {
            info!(
                target: "audit",
                event = %event_json,
                name = %name,
                reason = %reason,
                ip_address = ?ctx.ip_address,
                user_agent = ?ctx.user_agent,
                "Login failed"
            );
        }
        AuditEvent::Logout { user_id, name } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                name = %name,
                ip_address = ?ctx.ip_address,
                "User logout"
            );
        }
        AuditEvent::LogoutRejected { reason } => {
            info!(
                target: "audit",
                event = %event_json,
                reason = %reason,
                ip_address = ?ctx.ip_address,
                "Logout rejected"
            );
        }
        AuditEvent::RegistrationSuccess {
            user_id,
            name,
            role,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                name = %name,
                role = %role,
                ip_address = ?ctx.ip_address,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure { name, reason } => {
            info!(
                target: "audit",
                event = %event_json,
                name = %name,
                reason = %reason,
                ip_address = ?ctx.ip_address,
                "Registration failed"
            );
        }
        AuditEvent::AccountUpdated {
            user_id,
            name,
            updated_by,
            role,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                name = %name,
                updated_by = %updated_by,
                role = %role,
                ip_address = ?ctx.ip_address,
                "Account updated"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            name,
            resource,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                name = %name,
                resource = %resource,
                ip_address = ?ctx.ip_address,
                "Access denied"
            );
        }
        AuditEvent::InvalidToken { reason } => {
            warn!(
                target: "audit",
                event = %event_json,
                reason = %reason,
                ip_address = ?ctx.ip_address,
                user_agent = ?ctx.user_agent,
                "Invalid token"
            );
        }
    }
}

/// Extract IP address from request headers
///
/// Checks X-Forwarded-For, then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    // Check X-Forwarded-For (proxy/load balancer)
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            // Take the first IP in the chain (client IP)
            if let Some(first_ip) = xff_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    // Check X-Real-IP (nginx proxy)
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
