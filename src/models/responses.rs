//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{BudgetStatus, CacheValue, StoreInfo};

/// Response body for GET /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: CacheValue,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: CacheValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for PUT /cache
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// `warn` when the write landed near the total budget
    pub budget_status: BudgetStatus,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, budget_status: BudgetStatus) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            budget_status,
        }
    }
}

/// Response body for DELETE /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub key: String,
    /// Whether the key existed
    pub deleted: bool,
}

/// Response body for DELETE /cache?pattern=..
#[derive(Debug, Clone, Serialize)]
pub struct PatternDeleteResponse {
    pub pattern: String,
    pub deleted: usize,
}

/// Response body for POST /cache/:key/incr
#[derive(Debug, Clone, Serialize)]
pub struct IncrResponse {
    pub key: String,
    pub value: i64,
}

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreInfo>,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy(store: Option<StoreInfo>) -> Self {
        Self {
            status: "healthy".to_string(),
            reason: None,
            store,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            reason: Some(reason.into()),
            store: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for a successful POST /auth/verify
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub identifier: String,
    pub scopes: Vec<String>,
}

/// Error response body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
