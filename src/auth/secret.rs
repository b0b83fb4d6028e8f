//! Server Secret Module
//!
//! The process-wide HMAC key for credential hashing. Loaded once at
//! startup, validated against known placeholders and a minimum length, and
//! wiped from memory on drop.

use std::env;
use std::fmt;

use rand::RngCore;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::AuthError;

// == Public Constants ==
/// Minimum secret length in characters (32 hex chars = 128 bits)
pub const MIN_SECRET_LENGTH: usize = 32;

/// Environment variable holding the secret
pub const SECRET_ENV: &str = "API_KEY_SECRET";

/// Placeholder values that ship in example configuration files
const WEAK_DEFAULTS: &[&str] = &[
    "your-jwt-secret-key-here",
    "your-api-key-secret-here",
    "dev-secret-change-in-production",
    "changeme",
    "secret",
    "password",
    "your-secure-postgres-password-here",
    "optional-redis-password",
];

/// Checks a candidate secret against the placeholder list and minimum length.
pub fn is_valid_secret(secret: &str) -> bool {
    !secret.is_empty()
        && !WEAK_DEFAULTS.contains(&secret)
        && secret.chars().count() >= MIN_SECRET_LENGTH
}

// == Secret Policy ==
/// How strictly a weak secret is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretPolicy {
    /// Weak secrets are rejected
    Strict,
    /// Weak secrets are accepted with a warning; an empty secret is still rejected
    Development,
}

impl SecretPolicy {
    /// `Development` only when `ENVIRONMENT` explicitly names a dev or test
    /// environment; anything else, including unset, is `Strict`.
    pub fn from_env() -> Self {
        match env::var("ENVIRONMENT").map(|v| v.to_ascii_lowercase()).as_deref() {
            Ok("development") | Ok("dev") | Ok("test") => SecretPolicy::Development,
            _ => SecretPolicy::Strict,
        }
    }
}

// == Server Secret ==
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ServerSecret {
    bytes: Vec<u8>,
}

impl ServerSecret {
    /// Validates `value` under `policy`.
    pub fn new(value: impl Into<String>, policy: SecretPolicy) -> Result<Self, AuthError> {
        let mut value = value.into();

        if value.is_empty() {
            return Err(AuthError::MissingSecret(SECRET_ENV.to_string()));
        }

        if !is_valid_secret(&value) {
            match policy {
                SecretPolicy::Strict => {
                    value.zeroize();
                    return Err(AuthError::WeakSecret(format!(
                        "{} must be at least {} characters and not a placeholder",
                        SECRET_ENV, MIN_SECRET_LENGTH
                    )));
                }
                SecretPolicy::Development => {
                    warn!(
                        "Weak or default secret in {}; accepted in development mode only",
                        SECRET_ENV
                    );
                }
            }
        }

        let secret = Self {
            bytes: value.as_bytes().to_vec(),
        };
        value.zeroize();
        Ok(secret)
    }

    /// Loads the secret from `API_KEY_SECRET` using the environment's policy.
    pub fn from_env() -> Result<Self, AuthError> {
        let value = env::var(SECRET_ENV).unwrap_or_default();
        Self::new(value, SecretPolicy::from_env())
    }

    /// Generates a fresh 256-bit secret (hex-encoded).
    pub fn generate() -> Self {
        let mut raw = [0u8; 32];
        rand::rng().fill_bytes(&mut raw);
        let secret = Self {
            bytes: hex::encode(raw).into_bytes(),
        };
        raw.zeroize();
        secret
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerSecret(***)")
    }
}
