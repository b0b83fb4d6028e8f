//! API Handlers
//!
//! HTTP request handlers for each endpoint. Handlers only translate between
//! HTTP and the cache client or credential verifier; every policy decision
//! lives below this layer.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::auth::{CredentialVerifier, Verification};
use crate::cache::{CacheClient, Health};
use crate::error::{AuthError, Result};
use crate::models::{
    DeleteResponse, ErrorResponse, GetResponse, HealthResponse, IncrRequest, IncrResponse,
    PatternDeleteResponse, PatternQuery, SetRequest, SetResponse, VerifyRequest, VerifyResponse,
};

/// Body returned for every failed credential check
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheClient,
    pub verifier: Arc<CredentialVerifier>,
}

impl AppState {
    pub fn new(cache: CacheClient, verifier: CredentialVerifier) -> Self {
        Self {
            cache,
            verifier: Arc::new(verifier),
        }
    }
}

/// Handler for GET /health
///
/// 200 when the backing store answers, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> Response {
    match state.cache.health_check().await {
        Health::Healthy => {
            let info = state.cache.info().await.ok();
            Json(HealthResponse::healthy(info)).into_response()
        }
        Health::Unhealthy(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::unhealthy(reason)),
        )
            .into_response(),
    }
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    let response = match state.cache.get(&key).await? {
        Some(value) => Json(GetResponse::new(key, value)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Key not found: {}", key))),
        )
            .into_response(),
    };
    Ok(response)
}

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let status = state.cache.set(&req.key, &req.value, req.ttl).await?;
    Ok(Json(SetResponse::new(req.key, status)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.cache.delete(&key).await?;
    Ok(Json(DeleteResponse { key, deleted }))
}

/// Handler for DELETE /cache?pattern=..
pub async fn delete_pattern_handler(
    State(state): State<AppState>,
    Query(query): Query<PatternQuery>,
) -> Result<Json<PatternDeleteResponse>> {
    let deleted = state.cache.delete_pattern(&query.pattern).await?;
    Ok(Json(PatternDeleteResponse {
        pattern: query.pattern,
        deleted,
    }))
}

/// Handler for POST /cache/:key/incr
pub async fn incr_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<IncrRequest>,
) -> Result<Json<IncrResponse>> {
    let value = state.cache.increment(&key, req.amount).await?;
    Ok(Json(IncrResponse { key, value }))
}

/// Handler for POST /auth/verify
///
/// Every mismatch gets the same 401 body, whatever the cause.
pub async fn verify_handler(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> std::result::Result<Response, AuthError> {
    let response = match state.verifier.verify(&req.identifier, &req.secret).await? {
        Verification::Match(principal) => Json(VerifyResponse {
            identifier: principal.identifier,
            scopes: principal.scopes,
        })
        .into_response(),
        Verification::NoMatch => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(INVALID_CREDENTIALS)),
        )
            .into_response(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryCredentialStore, SecretHasher, ServerSecret};
    use crate::cache::{CacheValue, MemoryStore};
    use crate::config::Config;
    use crate::error::CacheError;
    use serde_json::json;

    fn test_state() -> AppState {
        let cache = CacheClient::new(Arc::new(MemoryStore::new()), &Config::default()).unwrap();
        let hasher = Arc::new(SecretHasher::new(&ServerSecret::generate()).unwrap());
        let verifier = CredentialVerifier::new(hasher, Arc::new(MemoryCredentialStore::new()));
        AppState::new(cache, verifier)
    }

    fn set_request(key: &str, value: serde_json::Value, ttl: Option<u64>) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value: CacheValue::from(value),
            ttl,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let req = set_request("user:42", json!({"name": "Ada"}), Some(3600));
        assert!(set_handler(State(state.clone()), Json(req)).await.is_ok());

        let response = get_handler(State(state), Path("user:42".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let response = get_handler(State(test_state()), Path("nonexistent".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_rejects_zero_ttl() {
        let req = set_request("user:42", json!(1), Some(0));
        let result = set_handler(State(test_state()), Json(req)).await;
        assert!(matches!(result, Err(CacheError::TtlOutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();
        let req = set_request("to_delete", json!("value"), None);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let first = delete_handler(State(state.clone()), Path("to_delete".to_string()))
            .await
            .unwrap();
        assert!(first.deleted);
        let second = delete_handler(State(state), Path("to_delete".to_string()))
            .await
            .unwrap();
        assert!(!second.deleted);
    }

    #[tokio::test]
    async fn test_incr_handler() {
        let state = test_state();
        let response = incr_handler(
            State(state),
            Path("views".to_string()),
            Json(IncrRequest { amount: 3 }),
        )
        .await
        .unwrap();
        assert_eq!(response.value, 3);
    }

    #[tokio::test]
    async fn test_verify_unknown_identifier_is_401() {
        let req = VerifyRequest {
            identifier: "key_404".to_string(),
            secret: "lxk_nope".to_string(),
        };
        let response = verify_handler(State(test_state()), Json(req)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
