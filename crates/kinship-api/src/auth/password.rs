/// Password hashing and verification using Argon2id
///
/// Hashes are PHC strings that embed the algorithm, version, cost
/// parameters and a fresh 16 byte salt, so nothing else is stored.
/// Verification of a malformed hash always reports a mismatch.
///
/// The async [`PasswordHasher`] runs the CPU-bound work on the blocking
/// pool, with a semaphore bounding how many hashes run at once.
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use kinship_core::AuthConfig;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    #[error("Hashing task aborted: {0}")]
    TaskFailed(String),
}

/// Argon2 cost configuration
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (lanes, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl From<&AuthConfig> for PasswordConfig {
    fn from(auth: &AuthConfig) -> Self {
        Self {
            memory_cost: auth.argon2_memory_kib,
            time_cost: auth.argon2_iterations,
            parallelism: auth.argon2_parallelism,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))
    }
}

/// Hash a plaintext password with the default cost parameters
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_config(password, &PasswordConfig::default())
}

/// Hash a password with custom configuration
///
/// # Returns
///
/// * `Ok(String)` - PHC string, e.g. `$argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>`
/// * `Err(PasswordError)` - If the parameters are invalid or hashing fails
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// Parameters and salt are read from the PHC string. Returns `false` for
/// a wrong password and for any hash that cannot be parsed or recomputed.
///
/// # Example
///
/// ```no_run
/// use kinship_api::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("secret123").unwrap();
/// assert!(verify_password("secret123", &hash));
/// assert!(!verify_password("secret124", &hash));
/// assert!(!verify_password("secret123", "not-a-phc-string"));
/// ```
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Fingerprint of a stored hash, safe to embed in a token
///
/// Changes whenever the stored hash changes, without revealing it.
pub fn fingerprint(password_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Async password hasher shared across requests
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    config: Arc<PasswordConfig>,
    permits: Arc<Semaphore>,
}

impl PasswordHasher {
    /// Create a hasher that runs at most `max_concurrent` hashes at once
    pub fn new(config: PasswordConfig, max_concurrent: usize) -> Self {
        Self {
            config: Arc::new(config),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Build from the auth section of the application config
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(PasswordConfig::from(auth), auth.hashing_concurrency)
    }

    /// Hash on the blocking pool
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?;

        let password = password.to_owned();
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?
    }

    /// Verify on the blocking pool; any failure is reported as a mismatch
    pub async fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(_permit) = self.permits.acquire().await else {
            return false;
        };

        let password = password.to_owned();
        let hash = hash.to_owned();
        match tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await {
            Ok(matched) => matched,
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> PasswordConfig {
    PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
        output_len: Some(32),
    }
}
