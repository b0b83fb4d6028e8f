//! Blocking Client Module
//!
//! Synchronous façade over `CacheClient` for callers outside an async
//! runtime. Owns a current-thread Tokio runtime and drives each call to
//! completion on it; must not be used from inside another runtime.

use std::collections::HashMap;

use tokio::runtime::{Builder, Runtime};

use crate::cache::bounds::BudgetStatus;
use crate::cache::client::{CacheClient, Health};
use crate::cache::CacheValue;
use crate::error::{CacheError, Result};

// == Blocking Cache Client ==
pub struct BlockingCacheClient {
    inner: CacheClient,
    runtime: Runtime,
}

impl BlockingCacheClient {
    pub fn new(inner: CacheClient) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to start runtime: {}", e)))?;
        Ok(Self { inner, runtime })
    }

    /// The async client this façade drives.
    pub fn client(&self) -> &CacheClient {
        &self.inner
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        self.runtime.block_on(self.inner.get(key))
    }

    pub fn set(&self, key: &str, value: &CacheValue, ttl: Option<u64>) -> Result<BudgetStatus> {
        self.runtime.block_on(self.inner.set(key, value, ttl))
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.delete(key))
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.exists(key))
    }

    pub fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        self.runtime.block_on(self.inner.delete_pattern(pattern))
    }

    pub fn clear(&self) -> Result<usize> {
        self.runtime.block_on(self.inner.clear())
    }

    pub fn mget<K: AsRef<str>>(&self, keys: &[K]) -> Result<HashMap<String, Option<CacheValue>>> {
        self.runtime.block_on(self.inner.mget(keys))
    }

    pub fn mset<K: AsRef<str>>(
        &self,
        entries: &[(K, CacheValue)],
        ttl: Option<u64>,
    ) -> Result<BudgetStatus> {
        self.runtime.block_on(self.inner.mset(entries, ttl))
    }

    /// Blocking `get_or_set`; `compute` runs on the calling thread.
    pub fn get_or_set<F, E>(
        &self,
        key: &str,
        ttl: Option<u64>,
        compute: F,
    ) -> std::result::Result<CacheValue, E>
    where
        F: FnOnce() -> std::result::Result<CacheValue, E>,
        E: From<CacheError>,
    {
        self.runtime
            .block_on(self.inner.get_or_set(key, ttl, move || async move { compute() }))
    }

    pub fn increment(&self, key: &str, amount: i64) -> Result<i64> {
        self.runtime.block_on(self.inner.increment(key, amount))
    }

    pub fn health_check(&self) -> Health {
        self.runtime.block_on(self.inner.health_check())
    }
}
