//! JWT token issuance and validation
//!
//! Implements session tokens signed with HMAC-SHA256. Keys are derived once
//! from the process secret when the [`TokenService`] is built; an empty
//! secret is rejected there so a misconfigured deployment never starts.

use super::models::UserRole;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use kinship_core::AuthConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// JWT ID - unique per issued token
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// Login name of the user
    pub name: String,
    /// User's role
    pub role: UserRole,
    /// Session identifier persisted on the user at login
    pub sid: String,
    /// Fingerprint of the password hash at issuance
    pub pwd: String,
}

/// Identity a token is issued for
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub name: &'a str,
    pub role: UserRole,
    pub session_id: &'a str,
    pub password_fingerprint: &'a str,
}

/// JWT token errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Token signing secret is not configured")]
    MissingSecret,

    #[error("Malformed token")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// JWT Configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Access token expiration time in seconds (default: 3600 = 1 hour)
    pub access_expiration_secs: u64,
    /// Token issuer identifier
    pub issuer: String,
}

impl From<&AuthConfig> for JwtConfig {
    fn from(auth: &AuthConfig) -> Self {
        Self {
            secret: auth.jwt_secret.clone(),
            access_expiration_secs: auth.token_ttl_secs,
            issuer: auth.issuer.clone(),
        }
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_expiration_secs", &self.access_expiration_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and validates signed session tokens
#[derive(Clone)]
pub struct TokenService {
    config: JwtConfig,
    keys: Arc<Keys>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build the service, deriving signing keys from the secret
    pub fn new(config: JwtConfig) -> Result<Self, JwtError> {
        if config.secret.trim().is_empty() {
            return Err(JwtError::MissingSecret);
        }

        let keys = Keys {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
        };

        Ok(Self {
            config,
            keys: Arc::new(keys),
        })
    }

    /// Default token lifetime in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.config.access_expiration_secs
    }

    /// Issue a token valid for `ttl_secs` from now
    pub fn issue(&self, subject: &TokenSubject<'_>, ttl_secs: u64) -> Result<String, JwtError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        self.issue_at(subject, now, ttl_secs)
    }

    /// Issue a token as if the current time were `issued_at`
    pub fn issue_at(
        &self,
        subject: &TokenSubject<'_>,
        issued_at: u64,
        ttl_secs: u64,
    ) -> Result<String, JwtError> {
        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: subject.user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
            name: subject.name.to_string(),
            role: subject.role,
            sid: subject.session_id.to_string(),
            pwd: subject.password_fingerprint.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)?;

        Ok(token)
    }

    /// Verify signature, issuer and expiry and return the claims
    ///
    /// Expiry is compared against this host's clock with no leeway.
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.keys.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::Malformed,
            }
        })?;

        Ok(token_data.claims)
    }
}
