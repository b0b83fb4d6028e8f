//! Credential Store Module
//!
//! Persistence seam for credential records. A record holds the keyed hash
//! of a secret, never the secret itself.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::auth::hasher::StoredHash;
use crate::error::AuthError;

// == Credential Record ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Public identifier (key ID or username)
    pub identifier: String,
    pub hash: StoredHash,
    pub scopes: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// None = never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// Creates an active, non-expiring record.
    pub fn new(identifier: impl Into<String>, hash: StoredHash) -> Self {
        Self {
            identifier: identifier.into(),
            hash,
            scopes: Vec::new(),
            active: true,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }

    /// Active and not expired.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired_at(now)
    }
}

// == Store Trait ==
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find(&self, identifier: &str) -> Result<Option<CredentialRecord>, AuthError>;

    /// Inserts or replaces the record with the same identifier.
    async fn save(&self, record: CredentialRecord) -> Result<(), AuthError>;

    /// Records a successful use.
    async fn touch(&self, identifier: &str, at: DateTime<Utc>) -> Result<(), AuthError>;
}

// == Provisioning ==
/// Env var listing provisioned credentials as `identifier=<stored hash>`
/// pairs separated by commas. Hashes use the stored form, so plaintext
/// keys never appear in the environment.
pub const CREDENTIALS_ENV: &str = "API_KEY_CREDENTIALS";

/// Parses a provisioning list such as
/// `svc_a=hmac-sha256$<hex>,svc_b=sha256$<hex>`.
///
/// Blank entries are skipped. Duplicate identifiers are an error.
pub fn parse_credentials(raw: &str) -> Result<Vec<CredentialRecord>, AuthError> {
    let mut records: Vec<CredentialRecord> = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (identifier, hash) = entry.split_once('=').ok_or_else(|| {
            AuthError::Internal(format!("{} entry is missing '='", CREDENTIALS_ENV))
        })?;
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AuthError::Internal(format!(
                "{} entry has an empty identifier",
                CREDENTIALS_ENV
            )));
        }
        if records.iter().any(|r| r.identifier == identifier) {
            return Err(AuthError::Internal(format!(
                "{} lists {} twice",
                CREDENTIALS_ENV, identifier
            )));
        }

        let hash: StoredHash = hash.trim().parse()?;
        records.push(CredentialRecord::new(identifier, hash));
    }

    Ok(records)
}

// == Memory Credential Store ==
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = CredentialRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.identifier.clone(), record))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Builds a store from [`CREDENTIALS_ENV`]. Unset means empty.
    pub fn from_env() -> Result<Self, AuthError> {
        match std::env::var(CREDENTIALS_ENV) {
            Ok(raw) => Ok(Self::with_records(parse_credentials(&raw)?)),
            Err(_) => Ok(Self::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Marks a record inactive. Returns whether it existed.
    pub async fn deactivate(&self, identifier: &str) -> bool {
        match self.records.write().await.get_mut(identifier) {
            Some(record) => {
                record.active = false;
                true
            }
            None => false,
        }
    }

    /// Removes expired records and returns how many were dropped.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        before - records.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find(&self, identifier: &str) -> Result<Option<CredentialRecord>, AuthError> {
        Ok(self.records.read().await.get(identifier).cloned())
    }

    async fn save(&self, record: CredentialRecord) -> Result<(), AuthError> {
        self.records
            .write()
            .await
            .insert(record.identifier.clone(), record);
        Ok(())
    }

    async fn touch(&self, identifier: &str, at: DateTime<Utc>) -> Result<(), AuthError> {
        if let Some(record) = self.records.write().await.get_mut(identifier) {
            record.last_used_at = Some(at);
        }
        Ok(())
    }
}
