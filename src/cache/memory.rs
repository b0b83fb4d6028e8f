//! Memory Store Module
//!
//! In-process implementation of the backing store protocol: a HashMap of
//! entries with lazy TTL expiry, plus an insertion-ordered index that
//! drives cursor scans. Scans resume from a sequence number rather than an
//! offset, so deleting keys mid-iteration never makes the scan skip others.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::entry::{current_timestamp_ms, StoredEntry};
use crate::cache::store::{glob_match, KvStore, ScanPage};
use crate::cache::StoreStats;
use crate::error::{CacheError, Result};

#[derive(Debug, Default)]
struct Inner {
    /// Key-value storage
    entries: HashMap<String, StoredEntry>,
    /// Scan order: sequence number -> key
    order: BTreeMap<u64, String>,
    /// Next sequence number to hand out (starts at 1; cursor 0 means "start")
    next_seq: u64,
    /// Sum of key and value bytes
    used_bytes: u64,
    stats: StoreStats,
}

impl Inner {
    fn insert(&mut self, key: &str, value: Vec<u8>, ttl: Option<u64>) {
        // Overwrites keep their scan position
        let live_seq = self
            .entries
            .get(key)
            .filter(|existing| !existing.is_expired())
            .map(|existing| existing.seq);
        let seq = match live_seq {
            Some(seq) => seq,
            None => {
                self.remove(key);
                self.next_seq += 1;
                self.order.insert(self.next_seq, key.to_string());
                self.next_seq
            }
        };

        let entry = StoredEntry::new(value, ttl, seq);
        self.used_bytes += entry.footprint(key);
        if let Some(old) = self.entries.insert(key.to_string(), entry) {
            self.used_bytes -= old.footprint(key);
        }
        self.stats.set_total_entries(self.entries.len());
    }

    fn remove(&mut self, key: &str) -> Option<StoredEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        self.used_bytes -= entry.footprint(key);
        self.stats.set_total_entries(self.entries.len());
        Some(entry)
    }

    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&StoredEntry> {
        if self.entries.get(key)?.is_expired() {
            self.remove(key);
            self.stats.record_expirations(1);
            return None;
        }
        self.entries.get(key)
    }
}

// == Memory Store ==
/// In-process backing store with TTL expiry and cursor scans.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Stats ==
    /// Returns current store statistics.
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let now = current_timestamp_ms();

        let expired_keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            inner.remove(key);
        }

        inner.stats.record_expirations(expired_keys.len());
        expired_keys.len()
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    // == Is Empty ==
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Remaining TTL in seconds for `key`, if it is live and has one.
    pub async fn ttl(&self, key: &str) -> Option<u64> {
        let mut inner = self.inner.write().await;
        inner.live(key).and_then(StoredEntry::ttl_remaining)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.write().await;
        let value = inner.live(key).map(|entry| entry.value.clone());
        match value {
            Some(_) => inner.stats.record_hit(),
            None => inner.stats.record_miss(),
        }
        Ok(value)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut inner = self.inner.write().await;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = inner.live(key).map(|entry| entry.value.clone());
            match value {
                Some(_) => inner.stats.record_hit(),
                None => inner.stats.record_miss(),
            }
            values.push(value);
        }
        Ok(values)
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<()> {
        self.inner
            .write()
            .await
            .insert(key, value.to_vec(), Some(ttl));
        Ok(())
    }

    async fn mset_ex(&self, entries: &[(String, Vec<u8>)], ttl: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        for (key, value) in entries {
            inner.insert(key, value.clone(), Some(ttl));
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut deleted = 0;
        for key in keys {
            if let Some(entry) = inner.remove(key) {
                if !entry.is_expired() {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let mut inner = self.inner.write().await;

        let (current, expires_at) = match inner.live(key) {
            Some(entry) => {
                let text = std::str::from_utf8(&entry.value).map_err(|_| {
                    CacheError::UnsupportedType("value is not an integer".to_string())
                })?;
                let current: i64 = text.trim().parse().map_err(|_| {
                    CacheError::UnsupportedType("value is not an integer".to_string())
                })?;
                (current, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current.checked_add(amount).ok_or_else(|| {
            CacheError::UnsupportedType("increment would overflow".to_string())
        })?;

        inner.insert(key, next.to_string().into_bytes(), None);
        // Counters keep whatever expiry they already had
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.expires_at = expires_at;
        }
        Ok(next)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        let mut inner = self.inner.write().await;
        inner.stats.record_scan();

        let batch: Vec<(u64, String)> = inner
            .order
            .range(cursor..)
            .take(count.max(1))
            .map(|(seq, key)| (*seq, key.clone()))
            .collect();

        let Some((last_seq, _)) = batch.last().cloned() else {
            return Ok(ScanPage::default());
        };

        let now = current_timestamp_ms();
        let mut keys = Vec::new();
        for (_, key) in batch {
            let expired = inner
                .entries
                .get(&key)
                .map_or(true, |entry| entry.is_expired_at(now));
            if expired {
                inner.remove(&key);
                inner.stats.record_expirations(1);
            } else if glob_match(pattern, &key) {
                keys.push(key);
            }
        }

        let next = if inner.order.range(last_seq + 1..).next().is_some() {
            last_seq + 1
        } else {
            0
        };

        Ok(ScanPage { cursor: next, keys })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.inner.write().await.live(key).is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn used_memory(&self) -> Result<u64> {
        Ok(self.inner.read().await.used_bytes)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn scan_all(store: &MemoryStore, pattern: &str, count: usize) -> (Vec<String>, usize) {
        let mut cursor = 0;
        let mut keys = Vec::new();
        let mut rounds = 0;
        loop {
            let page = store.scan(cursor, pattern, count).await.unwrap();
            rounds += 1;
            keys.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        (keys, rounds)
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let store = MemoryStore::new();

        store.set_ex("key1", b"value1", 300).await.unwrap();
        let value = store.get("key1").await.unwrap();

        assert_eq!(value.as_deref(), Some(&b"value1"[..]));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_get_nonexistent() {
        let store = MemoryStore::new();
        assert!(store.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_overwrite() {
        let store = MemoryStore::new();

        store.set_ex("key1", b"value1", 300).await.unwrap();
        store.set_ex("key1", b"value22", 300).await.unwrap();

        assert_eq!(
            store.get("key1").await.unwrap().as_deref(),
            Some(&b"value22"[..])
        );
        assert_eq!(store.len().await, 1);
        assert_eq!(store.used_memory().await.unwrap(), 4 + 7);
    }

    #[tokio::test]
    async fn test_store_delete_counts_existing_only() {
        let store = MemoryStore::new();
        store.set_ex("a", b"1", 300).await.unwrap();

        let deleted = store
            .delete(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.is_empty().await);
        assert_eq!(store.used_memory().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_ttl_expiration() {
        let store = MemoryStore::new();
        store.set_ex("key1", b"value1", 1).await.unwrap();

        assert!(store.get("key1").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(store.get("key1").await.unwrap().is_none());
        assert_eq!(store.stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_store_cleanup_expired() {
        let store = MemoryStore::new();

        store.set_ex("key1", b"value1", 1).await.unwrap();
        store.set_ex("key2", b"value2", 10).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get("key2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_incr_by() {
        let store = MemoryStore::new();

        assert_eq!(store.incr_by("hits", 1).await.unwrap(), 1);
        assert_eq!(store.incr_by("hits", 5).await.unwrap(), 6);
        assert_eq!(store.incr_by("hits", -2).await.unwrap(), 4);
        assert_eq!(store.get("hits").await.unwrap().as_deref(), Some(&b"4"[..]));
    }

    #[tokio::test]
    async fn test_incr_by_keeps_ttl() {
        let store = MemoryStore::new();
        store.set_ex("counter", b"10", 60).await.unwrap();

        assert_eq!(store.incr_by("counter", 1).await.unwrap(), 11);
        let ttl = store.ttl("counter").await.unwrap();
        assert!(ttl <= 60 && ttl >= 59);
    }

    #[tokio::test]
    async fn test_ttl_reports_live_entries_only() {
        let store = MemoryStore::new();
        store.set_ex("session", b"1", 30).await.unwrap();
        store.set_ex("brief", b"1", 1).await.unwrap();
        store.incr_by("fresh_counter", 1).await.unwrap();

        let ttl = store.ttl("session").await.unwrap();
        assert!(ttl <= 30 && ttl >= 29);
        assert_eq!(store.ttl("fresh_counter").await, None);
        assert_eq!(store.ttl("missing").await, None);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.ttl("brief").await, None);
    }

    #[tokio::test]
    async fn test_incr_by_rejects_non_integer() {
        let store = MemoryStore::new();
        store.set_ex("name", b"\"Ada\"", 60).await.unwrap();

        assert!(matches!(
            store.incr_by("name", 1).await,
            Err(CacheError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn test_scan_batches_and_completes() {
        let store = MemoryStore::new();
        for i in 0..250 {
            store.set_ex(&format!("user:{}", i), b"1", 300).await.unwrap();
        }

        let (keys, rounds) = scan_all(&store, "user:*", 100).await;
        assert_eq!(keys.len(), 250);
        assert_eq!(rounds, 3);
        assert_eq!(store.stats().await.scans, 3);
    }

    #[tokio::test]
    async fn test_scan_filters_by_pattern() {
        let store = MemoryStore::new();
        store.set_ex("user:1", b"1", 300).await.unwrap();
        store.set_ex("term:1", b"1", 300).await.unwrap();
        store.set_ex("user:2", b"1", 300).await.unwrap();

        let (mut keys, _) = scan_all(&store, "user:*", 10).await;
        keys.sort();
        assert_eq!(keys, vec!["user:1".to_string(), "user:2".to_string()]);
    }

    #[tokio::test]
    async fn test_scan_survives_deletes_mid_iteration() {
        let store = MemoryStore::new();
        for i in 0..30 {
            store.set_ex(&format!("k:{}", i), b"1", 300).await.unwrap();
        }

        let mut cursor = 0;
        let mut seen = 0;
        loop {
            let page = store.scan(cursor, "k:*", 10).await.unwrap();
            seen += page.keys.len();
            store.delete(&page.keys).await.unwrap();
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        assert_eq!(seen, 30);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_scan_empty_store() {
        let store = MemoryStore::new();
        let page = store.scan(0, "*", 100).await.unwrap();
        assert_eq!(page, ScanPage::default());
    }
}
