//! User models for authentication and authorization
//!
//! `User` is the persisted record; `UserPublic` is the only shape that
//! leaves the service in responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// User role enum
///
/// - Viewer: read-only access (default for new accounts)
/// - Editor: can modify family records
/// - Admin: full access including other users' accounts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum UserRole {
    #[default]
    Viewer,
    Editor,
    Admin,
}

impl UserRole {
    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Viewer => "Viewer",
            UserRole::Editor => "Editor",
            UserRole::Admin => "Admin",
        }
    }

    /// Parse role from string, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Some(UserRole::Viewer),
            "editor" => Some(UserRole::Editor),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account record
///
/// Maps to the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Assigned by the store on insert
    pub id: Uuid,

    /// Login name
    pub name: String,

    /// Contact address
    pub email: Option<String>,

    /// Argon2id PHC string
    pub password_hash: String,

    /// User's role
    pub role: UserRole,

    /// Marker of the live session; `None` when logged out
    pub session_id: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Convert user to public representation (without sensitive fields)
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A user that has not been stored yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
}

/// Public user representation (safe for API responses)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UserPublic {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
