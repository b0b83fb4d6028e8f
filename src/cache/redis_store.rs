//! Redis Store Module
//!
//! Backing store over a Redis-compatible server. Requires the `redis`
//! feature. Keys arrive already namespaced by the client, so this layer
//! maps each protocol call onto exactly one server command (or one atomic
//! pipeline for batched writes).

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, ErrorKind, RedisError};
use tracing::info;

use crate::cache::store::{KvStore, ScanPage};
use crate::error::{CacheError, Result};

// == Redis Store ==
/// Redis-backed store sharing one multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Opens a multiplexed connection to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("Redis client error: {}", e)))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable(format!("Redis connection error: {}", e)))?;

        info!("Connected to Redis at {}", redact(url));
        Ok(Self { conn })
    }
}

fn store_error(command: &'static str) -> impl Fn(RedisError) -> CacheError {
    move |e| {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            CacheError::Unavailable(format!("Redis {} error: {}", command, e))
        } else {
            CacheError::Internal(format!("Redis {} error: {}", command, e))
        }
    }
}

/// Strips credentials from a connection URL before it is logged.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Extracts `used_memory` from an `INFO memory` reply.
fn parse_used_memory(info: &str) -> Option<u64> {
    info.lines()
        .find_map(|line| line.strip_prefix("used_memory:"))
        .and_then(|value| value.trim().parse().ok())
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(store_error("GET"))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(store_error("MGET"))
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl)
            .await
            .map_err(store_error("SETEX"))
    }

    async fn mset_ex(&self, entries: &[(String, Vec<u8>)], ttl: u64) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.cmd("SET").arg(key).arg(value).arg("EX").arg(ttl).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(store_error("MULTI/SET"))?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del(keys).await.map_err(store_error("DEL"))
    }

    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, amount).await.map_err(|e| {
            if e.kind() == ErrorKind::ResponseError {
                CacheError::UnsupportedType(format!("value at key is not an integer: {}", e))
            } else {
                store_error("INCRBY")(e)
            }
        })
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        let mut conn = self.conn.clone();
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(store_error("SCAN"))?;
        Ok(ScanPage { cursor, keys })
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(store_error("EXISTS"))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_error("PING"))?;
        Ok(())
    }

    async fn used_memory(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let info: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await
            .map_err(store_error("INFO"))?;
        parse_used_memory(&info)
            .ok_or_else(|| CacheError::Internal("INFO reply has no used_memory field".to_string()))
    }
}
