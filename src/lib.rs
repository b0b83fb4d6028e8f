//! Secure Cache - A bounded, injection-safe cache policy layer
//!
//! Provides safe serialization, TTL and size bounds, hashed key derivation
//! and non-blocking pattern deletes over a Redis-compatible store, plus
//! HMAC credential verification with enumeration resistance.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheClient, CacheValue};
pub use config::Config;
pub use error::{AuthError, CacheError};
pub use tasks::spawn_cleanup_task;
