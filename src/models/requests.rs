//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

use crate::cache::CacheValue;

/// Request body for PUT /cache
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// Any JSON value
    pub value: CacheValue,
    /// Optional TTL in seconds; the configured default when absent
    #[serde(default)]
    pub ttl: Option<u64>,
}

/// Request body for POST /cache/:key/incr
#[derive(Debug, Clone, Deserialize)]
pub struct IncrRequest {
    #[serde(default = "default_amount")]
    pub amount: i64,
}

fn default_amount() -> i64 {
    1
}

/// Query string for DELETE /cache?pattern=..
#[derive(Debug, Clone, Deserialize)]
pub struct PatternQuery {
    pub pattern: String,
}

/// Request body for POST /auth/verify
#[derive(Deserialize)]
pub struct VerifyRequest {
    pub identifier: String,
    pub secret: String,
}

impl std::fmt::Debug for VerifyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyRequest")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .finish()
    }
}
