//! Stored Entry Module
//!
//! Defines the record the in-process store keeps per key.

use std::time::{SystemTime, UNIX_EPOCH};

// == Stored Entry ==
/// Represents a single stored value with expiry metadata.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Raw stored bytes
    pub value: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Scan position; stable across overwrites
    pub seq: u64,
}

impl StoredEntry {
    // == Constructor ==
    /// Creates a new entry with optional TTL in seconds.
    pub fn new(value: Vec<u8>, ttl_seconds: Option<u64>, seq: u64) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_seconds.map(|ttl| now.saturating_add(ttl.saturating_mul(1000)));

        Self {
            value,
            created_at: now,
            expires_at,
            seq,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches the expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            expires.saturating_sub(now) / 1000
        })
    }

    /// Approximate footprint counted against the memory budget.
    pub fn footprint(&self, key: &str) -> u64 {
        (key.len() + self.value.len()) as u64
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
