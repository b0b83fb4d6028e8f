//! Cache Module
//!
//! Secure, bounded caching over a Redis-compatible key-value store:
//! safe serialization, TTL and size bounds, collision-resistant key
//! derivation, cursor-batched pattern deletes and memoization.

pub mod blocking;
pub mod bounds;
pub mod client;
mod entry;
pub mod keys;
mod memory;
pub mod memoize;
#[cfg(feature = "redis")]
mod redis_store;
mod stats;
pub mod store;
pub mod value;


// Re-export public types
pub use blocking::BlockingCacheClient;
pub use bounds::BudgetStatus;
pub use client::{CacheClient, Health, StoreInfo};
pub use memoize::{Invalidator, Memoized, Memoizer};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use stats::StoreStats;
pub use store::{KvStore, ScanPage};
pub use value::CacheValue;
