//! Credential Verifier Module
//!
//! Checks a presented secret against the stored record for an identifier.
//! The only negative outcome callers see is `NoMatch`. Unknown identifiers
//! are compared against a fixed dummy record, and inactive, expired or
//! revoked records are rejected only after the full comparison, so every
//! path does the same work.

use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::auth::hasher::{Comparison, SecretHasher};
use crate::auth::revocations::Revocations;
use crate::auth::store::{CredentialRecord, CredentialStore};
use crate::error::AuthError;

// == Outcome ==
/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub identifier: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Match(Principal),
    NoMatch,
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Match(_))
    }
}

// == Observer ==
/// Receives migration signals. Called once per successful legacy match.
pub trait VerificationObserver: Send + Sync {
    fn legacy_match(&self, identifier: &str);
}

/// Emits legacy matches as structured log events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl VerificationObserver for TracingObserver {
    fn legacy_match(&self, identifier: &str) {
        info!(
            event = "legacy_credential_match",
            identifier, "Credential verified against legacy hash; rehashing"
        );
    }
}

// == Credential Verifier ==
pub struct CredentialVerifier {
    hasher: Arc<SecretHasher>,
    store: Arc<dyn CredentialStore>,
    revocations: Option<Revocations>,
    observer: Arc<dyn VerificationObserver>,
    dummy: CredentialRecord,
}

impl CredentialVerifier {
    pub fn new(hasher: Arc<SecretHasher>, store: Arc<dyn CredentialStore>) -> Self {
        // The dummy hash is of a random value nobody can present
        let mut unguessable = [0u8; 32];
        rand::rng().fill_bytes(&mut unguessable);
        let dummy = CredentialRecord::new("", hasher.hash(&hex::encode(unguessable)));
        Self {
            hasher,
            store,
            revocations: None,
            observer: Arc::new(TracingObserver),
            dummy,
        }
    }

    pub fn with_revocations(mut self, revocations: Revocations) -> Self {
        self.revocations = Some(revocations);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn VerificationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn hasher(&self) -> &Arc<SecretHasher> {
        &self.hasher
    }

    /// Verifies `secret` for `identifier`.
    ///
    /// Errors only when the credential store or revocation list cannot be
    /// reached; every kind of mismatch is `Ok(NoMatch)`.
    pub async fn verify(&self, identifier: &str, secret: &str) -> Result<Verification, AuthError> {
        let found = self.store.find(identifier).await?;
        let (record, known) = match &found {
            Some(record) => (record, true),
            None => (&self.dummy, false),
        };

        let comparison = self.hasher.compare(secret, &record.hash);
        let usable = record.is_usable_at(Utc::now());
        let revoked = match &self.revocations {
            Some(revocations) => revocations.is_revoked(identifier).await?,
            None => false,
        };

        if !known || !usable || revoked || comparison == Comparison::Mismatch {
            debug!(
                known,
                usable, revoked, "Credential rejected for {}", identifier
            );
            return Ok(Verification::NoMatch);
        }

        if comparison == Comparison::Legacy {
            self.observer.legacy_match(identifier);
            self.upgrade(record, secret).await;
        }

        if let Err(err) = self.store.touch(identifier, Utc::now()).await {
            error!("Failed to record credential use for {}: {}", identifier, err);
        }

        Ok(Verification::Match(Principal {
            identifier: record.identifier.clone(),
            scopes: record.scopes.clone(),
        }))
    }

    /// Replaces a legacy hash with a current-generation one.
    async fn upgrade(&self, record: &CredentialRecord, secret: &str) {
        let mut upgraded = record.clone();
        upgraded.hash = self.hasher.hash(secret);
        if let Err(err) = self.store.save(upgraded).await {
            error!("Failed to rehash legacy credential {}: {}", record.identifier, err);
        }
    }
}
