//! Memoization Module
//!
//! Wraps async functions so their results are cached under keys derived
//! from their arguments, plus a companion wrapper that invalidates key
//! patterns after a mutating operation succeeds.
//!
//! ```ignore
//! let lookup = client
//!     .memoize("term")
//!     .ttl(600)
//!     .wrap(|id: u64| async move { repo.find_term(id).await });
//! let term = lookup.call(42).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use crate::cache::client::CacheClient;
use crate::cache::keys;
use crate::cache::CacheValue;
use crate::error::{CacheError, Result};

/// Maps the argument tree to the tree that is actually hashed into the key.
pub type KeyBuilder = Arc<dyn Fn(&CacheValue) -> CacheValue + Send + Sync>;

// == Memoizer ==
/// Builder for memoized functions sharing a key prefix and TTL.
#[derive(Clone)]
pub struct Memoizer {
    client: CacheClient,
    prefix: String,
    ttl: Option<u64>,
    key_builder: Option<KeyBuilder>,
}

impl Memoizer {
    pub fn new(client: CacheClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            ttl: None,
            key_builder: None,
        }
    }

    /// TTL in seconds for cached results; the client default when unset.
    pub fn ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Custom key builder, e.g. to drop arguments that do not affect the result.
    pub fn key_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&CacheValue) -> CacheValue + Send + Sync + 'static,
    {
        self.key_builder = Some(Arc::new(builder));
        self
    }

    pub fn wrap<F>(self, func: F) -> Memoized<F> {
        Memoized {
            memoizer: self,
            func,
        }
    }

    /// Returns the cache key `args` map to.
    pub fn key_for<A: Serialize + ?Sized>(&self, args: &A) -> Result<String> {
        let params = CacheValue::from_serialize(args)?;
        let params = match &self.key_builder {
            Some(builder) => builder(&params),
            None => params,
        };
        keys::derive(&self.prefix, &params)
    }

    /// Removes the cached result for `args`.
    pub async fn forget<A: Serialize + ?Sized>(&self, args: &A) -> Result<bool> {
        let key = self.key_for(args)?;
        self.client.delete(&key).await
    }
}

// == Memoized ==
/// A function whose results are cached by argument.
pub struct Memoized<F> {
    memoizer: Memoizer,
    func: F,
}

impl<F> Memoized<F> {
    /// Returns the cached result for `args`, or calls the function and caches
    /// what it returns. Errors from the function are returned as-is and
    /// nothing is cached.
    pub async fn call<A, R, E, Fut>(&self, args: A) -> std::result::Result<R, E>
    where
        A: Serialize,
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        R: Serialize + DeserializeOwned,
        E: From<CacheError>,
    {
        let client = &self.memoizer.client;
        let key = self.memoizer.key_for(&args)?;

        if let Some(value) = client.get(&key).await? {
            match value.into_typed::<R>() {
                Ok(hit) => return Ok(hit),
                Err(err) => warn!("Memoized result for {} has unexpected shape: {}", key, err),
            }
        }

        let result = (self.func)(args).await?;
        let value = CacheValue::from_serialize(&result)?;
        client.set(&key, &value, self.memoizer.ttl).await?;
        debug!("Memoized result stored under {}", key);
        Ok(result)
    }

    pub fn memoizer(&self) -> &Memoizer {
        &self.memoizer
    }
}

// == Invalidator ==
/// Deletes key patterns after a mutating operation succeeds.
#[derive(Clone)]
pub struct Invalidator {
    client: CacheClient,
    patterns: Vec<String>,
}

impl Invalidator {
    pub fn new<I, S>(client: CacheClient, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client,
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Awaits `mutation`; on success deletes every configured pattern.
    ///
    /// A failed mutation leaves the cache untouched. A failed invalidation is
    /// logged and does not change the mutation's result.
    pub async fn run<T, E, Fut>(&self, mutation: Fut) -> std::result::Result<T, E>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let result = mutation.await?;

        for pattern in &self.patterns {
            match self.client.delete_pattern(pattern).await {
                Ok(deleted) => debug!("Invalidated {} keys matching {}", deleted, pattern),
                Err(err) => error!("Invalidation of {} failed: {}", pattern, err),
            }
        }

        Ok(result)
    }
}

impl CacheClient {
    /// Starts a memoizer whose keys live under `prefix`.
    pub fn memoize(&self, prefix: impl Into<String>) -> Memoizer {
        Memoizer::new(self.clone(), prefix)
    }

    /// Builds an invalidator for the given key patterns.
    pub fn invalidate_on_success<I, S>(&self, patterns: I) -> Invalidator
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invalidator::new(self.clone(), patterns)
    }
}
