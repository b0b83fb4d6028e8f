//! Error types for the cache layer and credential verification
//!
//! Provides unified error handling using thiserror. Policy violations
//! (bad input) and infrastructure failures (store down) are separate
//! variants so callers can decide which ones to retry.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// TTL outside the accepted window
    #[error("TTL of {ttl}s is outside the allowed range [{min}, {max}]")]
    TtlOutOfRange { ttl: u64, min: u64, max: u64 },

    /// Serialized value exceeds the per-value limit
    #[error("Value of {size} bytes exceeds maximum size of {limit} bytes")]
    ValueTooLarge { size: usize, limit: usize },

    /// Write would push the store past its total budget
    #[error("Cache budget exceeded: {projected} bytes projected, limit is {limit} bytes")]
    BudgetExceeded { projected: u64, limit: u64 },

    /// Value contains something outside the portable value model
    #[error("Unsupported value type: {0}")]
    UnsupportedType(String),

    /// Key or pattern is not safe to send to the store
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Stored bytes do not decode into the value model
    #[error("Corrupt cached data: {0}")]
    CorruptData(String),

    /// Backing store refused or dropped the connection
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A single store round-trip did not finish in time
    #[error("Store operation '{operation}' timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Pattern delete stopped part way; `deleted` keys were removed before the failure
    #[error("Pattern delete for '{pattern}' interrupted after deleting {deleted} keys")]
    PatternDeleteInterrupted {
        pattern: String,
        deleted: usize,
        #[source]
        source: Box<CacheError>,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// True when the caller's input was rejected by policy. Never retry these.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            CacheError::TtlOutOfRange { .. }
                | CacheError::ValueTooLarge { .. }
                | CacheError::BudgetExceeded { .. }
                | CacheError::UnsupportedType(_)
                | CacheError::InvalidKey(_)
        )
    }

    /// True for transient infrastructure failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CacheError::Unavailable(_) | CacheError::Timeout { .. } => true,
            CacheError::PatternDeleteInterrupted { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            CacheError::TtlOutOfRange { .. }
            | CacheError::UnsupportedType(_)
            | CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::ValueTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::BudgetExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
            CacheError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Timeout { .. } | CacheError::PatternDeleteInterrupted { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            CacheError::CorruptData(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            CacheError::PatternDeleteInterrupted { deleted, .. } => Json(json!({
                "error": self.to_string(),
                "deleted": deleted,
                "retryable": self.is_retryable(),
            })),
            _ => Json(json!({
                "error": self.to_string(),
                "retryable": self.is_retryable(),
            })),
        };

        (status, body).into_response()
    }
}

// == Auth Error Enum ==
/// Errors raised while setting up or running credential verification.
///
/// A wrong secret is not an error; it is `Verification::NoMatch`.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Required secret is not present in the environment
    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    /// Secret is a placeholder or too short
    #[error("Weak or default secret: {0}")]
    WeakSecret(String),

    /// Credential or revocation lookup failed
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CacheError> for AuthError {
    fn from(err: CacheError) -> Self {
        if err.is_retryable() {
            AuthError::StoreUnavailable(err.to_string())
        } else {
            AuthError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_errors_are_not_retryable() {
        let err = CacheError::TtlOutOfRange {
            ttl: 0,
            min: 1,
            max: 86_400,
        };
        assert!(err.is_policy_violation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_infrastructure_errors_are_retryable() {
        let err = CacheError::Timeout {
            operation: "get",
            after: Duration::from_secs(5),
        };
        assert!(!err.is_policy_violation());
        assert!(err.is_retryable());
        assert!(CacheError::Unavailable("refused".into()).is_retryable());
    }

    #[test]
    fn test_interrupted_pattern_delete_inherits_retryability() {
        let err = CacheError::PatternDeleteInterrupted {
            pattern: "user:*".into(),
            deleted: 3,
            source: Box::new(CacheError::Timeout {
                operation: "scan",
                after: Duration::from_millis(10),
            }),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("3 keys"));
    }

    #[test]
    fn test_status_codes() {
        let too_large = CacheError::ValueTooLarge { size: 2, limit: 1 };
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        let down = CacheError::Unavailable("down".into());
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
