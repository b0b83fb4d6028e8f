//! Revocation List Module
//!
//! Short-lived revocation markers kept in the cache so every instance
//! sharing the store stops accepting a credential at once. Marker keys are
//! derived from the identifier, so untrusted identifiers never reach the
//! store verbatim.

use tracing::info;

use crate::cache::{keys, CacheClient, CacheValue};
use crate::error::AuthError;

const REVOKED_PREFIX: &str = "revoked";

#[derive(Clone, Debug)]
pub struct Revocations {
    cache: CacheClient,
    ttl: u64,
}

impl Revocations {
    /// `ttl` is how long a marker lives, in seconds.
    pub fn new(cache: CacheClient, ttl: u64) -> Self {
        Self { cache, ttl }
    }

    fn marker_key(identifier: &str) -> Result<String, AuthError> {
        Ok(keys::derive(REVOKED_PREFIX, &CacheValue::from(identifier))?)
    }

    pub async fn revoke(&self, identifier: &str) -> Result<(), AuthError> {
        let key = Self::marker_key(identifier)?;
        self.cache
            .set(&key, &CacheValue::Bool(true), Some(self.ttl))
            .await?;
        info!("Credential revoked: {}", identifier);
        Ok(())
    }

    pub async fn is_revoked(&self, identifier: &str) -> Result<bool, AuthError> {
        let key = Self::marker_key(identifier)?;
        Ok(self.cache.exists(&key).await?)
    }

    /// Lifts a revocation. Returns whether a marker was present.
    pub async fn reinstate(&self, identifier: &str) -> Result<bool, AuthError> {
        let key = Self::marker_key(identifier)?;
        Ok(self.cache.delete(&key).await?)
    }
}
