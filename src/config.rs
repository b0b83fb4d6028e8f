//! Configuration Module
//!
//! Handles loading and managing cache policy and server configuration from
//! environment variables. Built once at startup and handed to the
//! constructors that need it.

use std::env;
use std::time::Duration;

use crate::cache::{bounds, keys};
use crate::error::{CacheError, Result};

/// Cache policy and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL in seconds for writes without explicit TTL
    pub default_ttl: u64,
    /// Namespace prepended to every store key
    pub key_prefix: String,
    /// Largest serialized value accepted, in bytes
    pub max_value_size: usize,
    /// Soft cap on total store usage, in bytes
    pub max_total_size: u64,
    /// Keys requested per SCAN round-trip
    pub scan_batch_size: usize,
    /// Upper bound on a single store round-trip
    pub connection_timeout: Duration,
    /// HTTP server port
    pub server_port: u16,
    /// Expiry sweep interval in seconds for the in-process store
    pub cleanup_interval: u64,
    /// Redis connection URL; the in-process store is used when absent
    pub redis_url: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 3600)
    /// - `CACHE_KEY_PREFIX` - Key namespace (default: "lexikon:")
    /// - `CACHE_MAX_VALUE_SIZE` - Per-value limit in bytes (default: 10 MiB)
    /// - `CACHE_MAX_TOTAL_SIZE` - Total budget in bytes (default: 100 MiB)
    /// - `CACHE_SCAN_BATCH_SIZE` - Keys per SCAN round-trip (default: 100)
    /// - `CACHE_CONNECTION_TIMEOUT` - Round-trip timeout in seconds (default: 5)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 1)
    /// - `REDIS_URL` - Redis URL (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: parse_env("CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            max_value_size: parse_env("CACHE_MAX_VALUE_SIZE").unwrap_or(defaults.max_value_size),
            max_total_size: parse_env("CACHE_MAX_TOTAL_SIZE").unwrap_or(defaults.max_total_size),
            scan_batch_size: parse_env("CACHE_SCAN_BATCH_SIZE")
                .unwrap_or(defaults.scan_batch_size),
            connection_timeout: parse_env("CACHE_CONNECTION_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connection_timeout),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_env("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
        }
    }

    /// Checks the configuration against the hard policy limits.
    pub fn validate(&self) -> Result<()> {
        bounds::check_ttl(self.default_ttl)?;
        keys::validate_prefix(&self.key_prefix)?;

        if self.max_value_size == 0 || self.max_value_size > bounds::MAX_VALUE_SIZE {
            return Err(CacheError::Internal(format!(
                "max_value_size must be in 1..={} bytes",
                bounds::MAX_VALUE_SIZE
            )));
        }
        if self.max_total_size < self.max_value_size as u64 {
            return Err(CacheError::Internal(
                "max_total_size must be at least max_value_size".to_string(),
            ));
        }
        if self.scan_batch_size == 0 {
            return Err(CacheError::Internal(
                "scan_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.connection_timeout.is_zero() {
            return Err(CacheError::Internal(
                "connection_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: 3600,
            key_prefix: "lexikon:".to_string(),
            max_value_size: bounds::MAX_VALUE_SIZE,
            max_total_size: bounds::MAX_TOTAL_SIZE,
            scan_batch_size: 100,
            connection_timeout: Duration::from_secs(5),
            server_port: 3000,
            cleanup_interval: 1,
            redis_url: None,
        }
    }
}
