//! Cache Client Module
//!
//! The façade callers use. Every write goes key validation → serializer →
//! TTL and size bounds → budget check → store. Every store round-trip runs
//! under the configured timeout, and store failures come back as retryable
//! errors distinct from policy rejections.
//!
//! Pattern deletes are slow but safe: they walk the keyspace with a cursor
//! in batches of `scan_batch_size`, so the store stays responsive while a
//! large delete is running. The walk is not atomic; a key written to a
//! matching name during the walk may or may not be deleted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::bounds::{self, BudgetStatus};
use crate::cache::keys;
use crate::cache::store::KvStore;
use crate::cache::value::{self, CacheValue};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Health ==
/// Result of a liveness probe against the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy(String),
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Health::Healthy)
    }
}

// == Store Info ==
/// Snapshot of store usage against the configured budget.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub used_memory_bytes: u64,
    pub budget_bytes: u64,
    pub usage_ratio: f64,
    pub budget_status: Option<BudgetStatus>,
}

// == Cache Client ==
/// Policy layer over a backing key-value store.
///
/// Cheap to clone; clones share the same store handle and configuration.
#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn KvStore>,
    config: Arc<Config>,
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CacheClient {
    // == Constructor ==
    /// Creates a client over `store` after validating `config`.
    pub fn new(store: Arc<dyn KvStore>, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config: Arc::new(config.clone()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Prepends the namespace after checking the caller's key.
    fn namespaced(&self, key: &str) -> Result<String> {
        keys::validate_key(key)?;
        let full = format!("{}{}", self.config.key_prefix, key);
        if full.len() > keys::MAX_KEY_LENGTH {
            return Err(CacheError::InvalidKey(format!(
                "namespaced key exceeds maximum length of {} bytes",
                keys::MAX_KEY_LENGTH
            )));
        }
        Ok(full)
    }

    /// Runs one store round-trip under the configured timeout.
    async fn round_trip<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let after = self.config.connection_timeout;
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = after.as_millis() as u64, "Store round-trip timed out");
                Err(CacheError::Timeout { operation, after })
            }
        }
    }

    /// Serializes and bounds-checks a value; returns the bytes to write.
    fn encode(&self, key: &str, value: &CacheValue) -> Result<Vec<u8>> {
        let bytes = value::serialize(value)?;
        bounds::check_size(&bytes, self.config.max_value_size).inspect_err(|err| {
            warn!(key, kind = value.kind(), "Cache write rejected: {}", err);
        })?;
        Ok(bytes)
    }

    fn effective_ttl(&self, ttl: Option<u64>) -> Result<u64> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        bounds::check_ttl(ttl).inspect_err(|err| warn!("Cache write rejected: {}", err))?;
        Ok(ttl)
    }

    async fn check_budget(&self, incoming: u64) -> Result<BudgetStatus> {
        let usage = self.round_trip("info", self.store.used_memory()).await?;
        bounds::check_total_budget(usage, incoming, self.config.max_total_size)
            .inspect_err(|err| warn!("Cache write rejected: {}", err))
    }

    // == Get ==
    /// Reads a value. A missing key is `Ok(None)`; so is a stored value that
    /// no longer decodes, which is logged and otherwise treated as a miss.
    pub async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let full = self.namespaced(key)?;
        let raw = self.round_trip("get", self.store.get(&full)).await?;

        match raw {
            None => {
                debug!("Cache miss: {}", key);
                Ok(None)
            }
            Some(bytes) => match value::deserialize(&bytes) {
                Ok(value) => {
                    debug!("Cache hit: {}", key);
                    Ok(Some(value))
                }
                Err(err) => {
                    error!("Discarding corrupt cache entry {}: {}", key, err);
                    Ok(None)
                }
            },
        }
    }

    /// Reads a value and converts it into `T`; a value of the wrong shape is a miss.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.get(key).await? else {
            return Ok(None);
        };
        match value.into_typed() {
            Ok(typed) => Ok(Some(typed)),
            Err(err) => {
                warn!("Cached value for {} has unexpected shape: {}", key, err);
                Ok(None)
            }
        }
    }

    // == Set ==
    /// Writes a value with `ttl` seconds (the configured default when `None`).
    ///
    /// Returns `BudgetStatus::Warn` when the write landed in the upper band
    /// of the total budget.
    pub async fn set(&self, key: &str, value: &CacheValue, ttl: Option<u64>) -> Result<BudgetStatus> {
        let full = self.namespaced(key)?;
        let bytes = self.encode(key, value)?;
        let ttl = self.effective_ttl(ttl)?;
        let status = self
            .check_budget((full.len() + bytes.len()) as u64)
            .await?;

        self.round_trip("set", self.store.set_ex(&full, &bytes, ttl))
            .await?;
        debug!("Cache set: {} (TTL: {}s, {} bytes)", key, ttl, bytes.len());
        Ok(status)
    }

    /// Converts `value` into the cache value model, then writes it.
    pub async fn set_from<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
    ) -> Result<BudgetStatus> {
        let value = CacheValue::from_serialize(value).inspect_err(|err| {
            warn!("Cache write for {} rejected: {}", key, err);
        })?;
        self.set(key, &value, ttl).await
    }

    // == Delete ==
    /// Removes a key. Deleting a missing key is not an error.
    ///
    /// Returns whether the key existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full = self.namespaced(key)?;
        let deleted = self.round_trip("del", self.store.delete(&[full])).await?;
        if deleted > 0 {
            debug!("Cache invalidated: {}", key);
        }
        Ok(deleted > 0)
    }

    /// Checks whether a live entry exists for `key`.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let full = self.namespaced(key)?;
        self.round_trip("exists", self.store.exists(&full)).await
    }

    // == Delete Pattern ==
    /// Deletes every key in the namespace matching the glob `pattern`.
    ///
    /// Walks the keyspace one `scan_batch_size` batch per round-trip and
    /// deletes each batch before fetching the next. If any round-trip fails
    /// or times out, the walk stops and the error carries the number of
    /// keys already deleted.
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        keys::validate_pattern(pattern)?;
        let full_pattern = format!("{}{}", self.config.key_prefix, pattern);
        let batch_size = self.config.scan_batch_size;

        let mut cursor = 0;
        let mut deleted = 0;
        let mut rounds = 0;
        loop {
            let step = async {
                let page = self
                    .round_trip("scan", self.store.scan(cursor, &full_pattern, batch_size))
                    .await?;
                let removed = if page.keys.is_empty() {
                    0
                } else {
                    self.round_trip("del", self.store.delete(&page.keys)).await?
                };
                Ok::<_, CacheError>((page.cursor, removed))
            };

            match step.await {
                Ok((next, removed)) => {
                    deleted += removed;
                    rounds += 1;
                    cursor = next;
                }
                Err(source) => {
                    error!(
                        pattern,
                        deleted, "Pattern delete aborted after {} batches: {}", rounds, source
                    );
                    return Err(CacheError::PatternDeleteInterrupted {
                        pattern: pattern.to_string(),
                        deleted,
                        source: Box::new(source),
                    });
                }
            }

            if cursor == 0 {
                break;
            }
        }

        debug!(
            "Cache invalidated {} keys matching {} in {} batches",
            deleted, pattern, rounds
        );
        Ok(deleted)
    }

    /// Deletes every key under this client's namespace.
    pub async fn clear(&self) -> Result<usize> {
        let deleted = self.delete_pattern("*").await?;
        info!("Cache cleared: {} entries removed", deleted);
        Ok(deleted)
    }

    // == Bulk Operations ==
    /// Reads several keys in one round-trip. Missing or corrupt entries map to `None`.
    pub async fn mget<K: AsRef<str>>(
        &self,
        keys: &[K],
    ) -> Result<HashMap<String, Option<CacheValue>>> {
        let full_keys = keys
            .iter()
            .map(|k| self.namespaced(k.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let raw = self.round_trip("mget", self.store.mget(&full_keys)).await?;

        let result = keys
            .iter()
            .zip(raw)
            .map(|(key, bytes)| {
                let key = key.as_ref();
                let value = bytes.and_then(|bytes| match value::deserialize(&bytes) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        error!("Discarding corrupt cache entry {}: {}", key, err);
                        None
                    }
                });
                (key.to_string(), value)
            })
            .collect();

        debug!("Cache mget: {} keys", keys.len());
        Ok(result)
    }

    /// Writes several entries with one TTL. Every entry is validated before
    /// anything is written; one bad entry rejects the whole batch.
    pub async fn mset<K: AsRef<str>>(
        &self,
        entries: &[(K, CacheValue)],
        ttl: Option<u64>,
    ) -> Result<BudgetStatus> {
        let ttl = self.effective_ttl(ttl)?;

        let mut encoded = Vec::with_capacity(entries.len());
        let mut incoming = 0u64;
        for (key, value) in entries {
            let key = key.as_ref();
            let full = self.namespaced(key)?;
            let bytes = self.encode(key, value)?;
            incoming += (full.len() + bytes.len()) as u64;
            encoded.push((full, bytes));
        }

        let status = self.check_budget(incoming).await?;
        self.round_trip("mset", self.store.mset_ex(&encoded, ttl))
            .await?;
        debug!("Cache mset: {} keys (TTL: {}s)", entries.len(), ttl);
        Ok(status)
    }

    // == Get Or Set ==
    /// Returns the cached value, or computes, stores and returns it on a miss.
    ///
    /// Concurrent misses on the same key each run `compute`; there is no
    /// single-flight coalescing.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<u64>,
        compute: F,
    ) -> std::result::Result<CacheValue, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<CacheValue, E>>,
        E: From<CacheError>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = compute().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }

    // == Increment ==
    /// Atomically adds `amount` to the counter at `key` and returns the new value.
    ///
    /// Counters are native store integers and skip the value serializer.
    pub async fn increment(&self, key: &str, amount: i64) -> Result<i64> {
        let full = self.namespaced(key)?;
        self.round_trip("incr", self.store.incr_by(&full, amount))
            .await
    }

    // == Health ==
    /// Pings the store. Never fails; an unreachable store is `Unhealthy`.
    pub async fn health_check(&self) -> Health {
        match self.round_trip("ping", self.store.ping()).await {
            Ok(()) => Health::Healthy,
            Err(err) => {
                warn!("Cache health check failed: {}", err);
                Health::Unhealthy(err.to_string())
            }
        }
    }

    /// Reports store usage against the total budget.
    pub async fn info(&self) -> Result<StoreInfo> {
        let used = self.round_trip("info", self.store.used_memory()).await?;
        let budget = self.config.max_total_size;
        Ok(StoreInfo {
            used_memory_bytes: used,
            budget_bytes: budget,
            usage_ratio: used as f64 / budget as f64,
            budget_status: bounds::check_total_budget(used, 0, budget).ok(),
        })
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::ScanPage;
    use crate::cache::value::MAX_DEPTH;
    use crate::cache::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn client_with(store: Arc<dyn KvStore>, config: Config) -> CacheClient {
        CacheClient::new(store, &config).unwrap()
    }

    fn client() -> (CacheClient, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (client_with(store.clone(), Config::default()), store)
    }

    fn ada() -> CacheValue {
        CacheValue::from(json!({"name": "Ada"}))
    }

    /// Delegates to a MemoryStore but stalls scans after `fast_scans` calls.
    struct StallingStore {
        inner: MemoryStore,
        fast_scans: usize,
        scans: AtomicUsize,
    }

    #[async_trait]
    impl KvStore for StallingStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.inner.get(key).await
        }
        async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
            self.inner.mget(keys).await
        }
        async fn set_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<()> {
            self.inner.set_ex(key, value, ttl).await
        }
        async fn mset_ex(&self, entries: &[(String, Vec<u8>)], ttl: u64) -> Result<()> {
            self.inner.mset_ex(entries, ttl).await
        }
        async fn delete(&self, keys: &[String]) -> Result<usize> {
            self.inner.delete(keys).await
        }
        async fn incr_by(&self, key: &str, amount: i64) -> Result<i64> {
            self.inner.incr_by(key, amount).await
        }
        async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
            if self.scans.fetch_add(1, Ordering::SeqCst) >= self.fast_scans {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.inner.scan(cursor, pattern, count).await
        }
        async fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key).await
        }
        async fn ping(&self) -> Result<()> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn used_memory(&self) -> Result<u64> {
            self.inner.used_memory().await
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (client, _) = client();

        client.set("user:42", &ada(), Some(3600)).await.unwrap();
        assert_eq!(client.get("user:42").await.unwrap(), Some(ada()));
    }

    #[tokio::test]
    async fn test_keys_are_namespaced() {
        let (client, store) = client();

        client.set("user:42", &ada(), None).await.unwrap();
        assert!(store.get("lexikon:user:42").await.unwrap().is_some());
        assert!(store.get("user:42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (client, _) = client();
        assert_eq!(client.get("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_out_of_range_rejected() {
        let (client, store) = client();

        for ttl in [0, 86_401, u64::MAX] {
            let result = client.set("user:42", &ada(), Some(ttl)).await;
            assert!(matches!(result, Err(CacheError::TtlOutOfRange { .. })));
        }
        assert!(store.is_empty().await);
        assert!(client.set("user:42", &ada(), Some(1)).await.is_ok());
        assert!(client.set("user:42", &ada(), Some(86_400)).await.is_ok());
    }

    #[tokio::test]
    async fn test_value_size_boundary() {
        let config = Config {
            max_value_size: 1024,
            ..Config::default()
        };
        let client = client_with(Arc::new(MemoryStore::new()), config);

        // A JSON string serializes with two quote bytes
        let exact = CacheValue::from("x".repeat(1022));
        assert!(client.set("exact", &exact, None).await.is_ok());

        let over = CacheValue::from("x".repeat(1023));
        assert!(matches!(
            client.set("over", &over, None).await,
            Err(CacheError::ValueTooLarge {
                size: 1025,
                limit: 1024
            })
        ));
    }

    #[tokio::test]
    async fn test_budget_exceeded_rejected() {
        let config = Config {
            max_value_size: 100,
            max_total_size: 200,
            ..Config::default()
        };
        let client = client_with(Arc::new(MemoryStore::new()), config);
        let value = CacheValue::from("x".repeat(75));

        assert_eq!(
            client.set("a", &value, None).await.unwrap(),
            BudgetStatus::Ok
        );
        assert_eq!(
            client.set("b", &value, None).await.unwrap(),
            BudgetStatus::Warn
        );
        assert!(matches!(
            client.set("c", &value, None).await,
            Err(CacheError::BudgetExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_type_rejected() {
        struct Opaque;
        impl Serialize for Opaque {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_bytes(&[0x80, 0x04])
            }
        }

        let (client, store) = client();
        let result = client.set_from("blob", &Opaque, None).await;
        assert!(matches!(result, Err(CacheError::UnsupportedType(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_nesting_depth_limit() {
        let (client, store) = client();
        let nested = |depth: usize| {
            (0..depth).fold(CacheValue::from(1i64), |inner, _| {
                CacheValue::Sequence(vec![inner])
            })
        };

        let deepest = nested(MAX_DEPTH);
        client.set("deep", &deepest, Some(60)).await.unwrap();
        assert_eq!(client.get("deep").await.unwrap(), Some(deepest));

        let result = client.set("deeper", &nested(200), Some(60)).await;
        assert!(matches!(result, Err(CacheError::UnsupportedType(_))));
        assert!(!store.exists("lexikon:deeper").await.unwrap());
    }

    #[tokio::test]
    async fn test_time_values() {
        let (client, _) = client();

        let result = client
            .set_from("when", &std::time::SystemTime::now(), Some(60))
            .await;
        assert!(matches!(result, Err(CacheError::UnsupportedType(_))));

        // chrono timestamps arrive as RFC 3339 text and round-trip as such
        let now = chrono::Utc::now();
        client.set_from("stamp", &now, Some(60)).await.unwrap();
        let back: Option<chrono::DateTime<chrono::Utc>> = client.get_as("stamp").await.unwrap();
        assert_eq!(back, Some(now));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (client, store) = client();
        store
            .set_ex("lexikon:broken", b"\x80\x04pickle", 60)
            .await
            .unwrap();

        assert_eq!(client.get("broken").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let (client, _) = client();
        assert!(matches!(
            client.get("user:*").await,
            Err(CacheError::InvalidKey(_))
        ));
        assert!(client.set("bad key", &ada(), None).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (client, _) = client();
        client.set("k", &ada(), None).await.unwrap();

        assert!(client.delete("k").await.unwrap());
        assert!(!client.delete("k").await.unwrap());
        assert_eq!(client.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let (client, _) = client();
        client.set("user:42", &ada(), None).await.unwrap();
        client.set("user:43", &ada(), None).await.unwrap();
        client.set("term:1", &ada(), None).await.unwrap();

        assert_eq!(client.delete_pattern("user:*").await.unwrap(), 2);
        assert_eq!(client.get("user:42").await.unwrap(), None);
        assert_eq!(client.get("user:43").await.unwrap(), None);
        assert!(client.get("term:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_pattern_batches() {
        let config = Config {
            scan_batch_size: 10,
            ..Config::default()
        };
        let store = Arc::new(MemoryStore::new());
        let client = client_with(store.clone(), config);
        for i in 0..95 {
            client.set(&format!("k:{}", i), &ada(), None).await.unwrap();
        }

        assert_eq!(client.delete_pattern("k:*").await.unwrap(), 95);
        assert_eq!(store.stats().await.scans, 10);
    }

    #[tokio::test]
    async fn test_delete_pattern_timeout_reports_progress() {
        let config = Config {
            scan_batch_size: 10,
            connection_timeout: Duration::from_millis(50),
            ..Config::default()
        };
        let store = Arc::new(StallingStore {
            inner: MemoryStore::new(),
            fast_scans: 2,
            scans: AtomicUsize::new(0),
        });
        let client = client_with(store, config);
        for i in 0..50 {
            client.set(&format!("k:{}", i), &ada(), None).await.unwrap();
        }

        match client.delete_pattern("k:*").await {
            Err(CacheError::PatternDeleteInterrupted {
                deleted, source, ..
            }) => {
                assert_eq!(deleted, 20);
                assert!(matches!(*source, CacheError::Timeout { operation: "scan", .. }));
            }
            other => panic!("expected interrupted delete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_only_touches_namespace() {
        let (client, store) = client();
        store.set_ex("other:1", b"1", 60).await.unwrap();
        client.set("a", &ada(), None).await.unwrap();
        client.set("b", &ada(), None).await.unwrap();

        assert_eq!(client.clear().await.unwrap(), 2);
        assert!(store.get("other:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mget_mixed() {
        let (client, _) = client();
        client.set("a", &CacheValue::from(1i64), None).await.unwrap();
        client.set("c", &CacheValue::from(3i64), None).await.unwrap();

        let result = client.mget(&["a", "b", "c"]).await.unwrap();
        assert_eq!(result["a"], Some(CacheValue::from(1i64)));
        assert_eq!(result["b"], None);
        assert_eq!(result["c"], Some(CacheValue::from(3i64)));
    }

    #[tokio::test]
    async fn test_mset_is_all_or_nothing() {
        let config = Config {
            max_value_size: 64,
            ..Config::default()
        };
        let client = client_with(Arc::new(MemoryStore::new()), config);

        let entries = vec![
            ("key1", CacheValue::from("small")),
            ("key2", CacheValue::from("x".repeat(100))),
            ("key3", CacheValue::from("small")),
        ];
        assert!(matches!(
            client.mset(&entries, None).await,
            Err(CacheError::ValueTooLarge { .. })
        ));
        for key in ["key1", "key2", "key3"] {
            assert_eq!(client.get(key).await.unwrap(), None);
        }

        let entries = vec![("key1", CacheValue::from(1i64)), ("key3", CacheValue::from(3i64))];
        client.mset(&entries, Some(60)).await.unwrap();
        assert_eq!(client.get("key3").await.unwrap(), Some(CacheValue::from(3i64)));
    }

    #[tokio::test]
    async fn test_get_or_set_miss_then_hit() {
        let (client, _) = client();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = client
                .get_or_set("expensive", Some(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(CacheValue::from("computed"))
                })
                .await
                .unwrap();
            assert_eq!(value, CacheValue::from("computed"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_set_reports_policy_failure() {
        let (client, _) = client();
        let result = client
            .get_or_set("k", Some(0), || async {
                Ok::<_, CacheError>(CacheValue::Null)
            })
            .await;
        assert!(matches!(result, Err(CacheError::TtlOutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_increment() {
        let (client, _) = client();
        assert_eq!(client.increment("views", 1).await.unwrap(), 1);
        assert_eq!(client.increment("views", 10).await.unwrap(), 11);
        assert_eq!(client.get("views").await.unwrap(), Some(CacheValue::from(11i64)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let (client, _) = client();
        assert_eq!(client.health_check().await, Health::Healthy);

        let down = client_with(
            Arc::new(StallingStore {
                inner: MemoryStore::new(),
                fast_scans: 0,
                scans: AtomicUsize::new(0),
            }),
            Config::default(),
        );
        assert!(!down.health_check().await.is_healthy());
    }

    #[tokio::test]
    async fn test_get_as_typed() {
        #[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
        struct Term {
            name: String,
            level: u8,
        }

        let (client, _) = client();
        let term = Term {
            name: "ontology".into(),
            level: 2,
        };
        client.set_from("term:1", &term, None).await.unwrap();

        assert_eq!(client.get_as::<Term>("term:1").await.unwrap(), Some(term));
        assert_eq!(client.get_as::<Vec<u8>>("term:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_info_reports_usage() {
        let (client, _) = client();
        client.set("a", &ada(), None).await.unwrap();

        let info = client.info().await.unwrap();
        assert!(info.used_memory_bytes > 0);
        assert_eq!(info.budget_status, Some(BudgetStatus::Ok));
    }
}
