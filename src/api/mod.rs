//! API Module
//!
//! HTTP handlers and routing for the cache and credential endpoints.
//!
//! # Endpoints
//! - `GET /health` - Backing store health
//! - `PUT /cache` - Store a JSON value
//! - `GET /cache/:key` - Retrieve a value by key
//! - `DELETE /cache/:key` - Delete a key
//! - `DELETE /cache?pattern=..` - Delete keys matching a glob, in batches
//! - `POST /cache/:key/incr` - Atomic counter increment
//! - `POST /auth/verify` - Verify an API key against the provisioned
//!   credentials (`API_KEY_CREDENTIALS`)

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
