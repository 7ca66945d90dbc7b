//! User persistence
//!
//! The auth flows only need lookup by name, insert and save-by-id, so the
//! store is a small trait:
//! - `PgUserStore` keeps users in PostgreSQL through SQLx
//! - `MemoryUserStore` keeps them in a map, for development and tests
//!
//! Names are not uniquely indexed. `insert` refuses a name that is already
//! taken, checking and writing as one step so concurrent registrations of
//! one name cannot both succeed.

use super::models::{NewUser, User, UserRole};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Name already taken: {0}")]
    NameTaken(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::DatabaseError(err.to_string())
    }
}

/// Storage for user accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by login name
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, RepositoryError>;

    /// Store a new user, assigning its id
    ///
    /// Fails with `NameTaken` when a user with the same name exists.
    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Write the full record, keyed by id
    async fn save(&self, user: &User) -> Result<(), RepositoryError>;

    /// Whether the store is reachable
    async fn ping(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// PostgreSQL
// ============================================================================

/// PostgreSQL user store
pub struct PgUserStore {
    pool: PgPool,
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    password_hash: String,
    role: String,
    session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let role = UserRole::parse(&row.role).unwrap_or_else(|| {
            tracing::warn!(user_id = %row.id, role = %row.role, "Unknown role stored, using Viewer");
            UserRole::Viewer
        });

        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            session_id: row.session_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PgUserStore {
    /// Connect and make sure the `users` table exists
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        let store = Self::from_pool(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `users` table if it is missing
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'Viewer',
                session_id TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS users_name_idx ON users (name)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password_hash, role, session_id, created_at, updated_at FROM users WHERE name = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Serializes inserts of the same name until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&user.name)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, session_id, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, NULL, $6, $6
            WHERE NOT EXISTS (SELECT 1 FROM users WHERE name = $2)
            RETURNING id, name, email, password_hash, role, session_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        row.map(User::from)
            .ok_or(RepositoryError::NameTaken(user.name))
    }

    async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, session_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                role = EXCLUDED.role,
                session_id = EXCLUDED.session_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.session_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-memory user store
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|u| u.name == name)
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.name == user.name) {
            return Err(RepositoryError::NameTaken(user.name));
        }

        let now = Utc::now();
        let stored = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            session_id: None,
            created_at: now,
            updated_at: now,
        };

        users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "memory"
    }
}
