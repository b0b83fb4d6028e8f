//! API Key Issuing Module
//!
//! Generates API keys from OS randomness. The plaintext is handed back
//! exactly once; only its current-generation hash is persisted.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::auth::hasher::SecretHasher;
use crate::auth::store::CredentialRecord;

/// Prefix of every issued API key
pub const API_KEY_PREFIX: &str = "lxk_";

/// Random bytes per key (64 hex chars)
const KEY_BYTES: usize = 32;

/// A freshly issued key. `plaintext` is wiped when dropped.
pub struct IssuedKey {
    pub plaintext: Zeroizing<String>,
    pub record: CredentialRecord,
}

#[derive(Clone, Debug)]
pub struct ApiKeyIssuer {
    hasher: Arc<SecretHasher>,
}

impl ApiKeyIssuer {
    pub fn new(hasher: Arc<SecretHasher>) -> Self {
        Self { hasher }
    }

    /// Issues a key for `identifier`; the caller persists `record`.
    pub fn issue(
        &self,
        identifier: impl Into<String>,
        scopes: Vec<String>,
        expires_in: Option<Duration>,
    ) -> IssuedKey {
        let mut raw = Zeroizing::new([0u8; KEY_BYTES]);
        rand::rng().fill_bytes(&mut *raw);
        let plaintext = Zeroizing::new(format!("{}{}", API_KEY_PREFIX, hex::encode(&*raw)));

        let mut record =
            CredentialRecord::new(identifier, self.hasher.hash(&plaintext)).with_scopes(scopes);
        if let Some(expires_in) = expires_in {
            record = record.with_expiry(Utc::now() + expires_in);
        }

        IssuedKey { plaintext, record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hasher::Comparison;
    use crate::auth::secret::ServerSecret;

    fn issuer() -> (ApiKeyIssuer, Arc<SecretHasher>) {
        let hasher = Arc::new(SecretHasher::new(&ServerSecret::generate()).unwrap());
        (ApiKeyIssuer::new(hasher.clone()), hasher)
    }

    #[test]
    fn test_issued_key_format() {
        let (issuer, _) = issuer();
        let issued = issuer.issue("key_1", vec!["read".into()], None);

        assert!(issued.plaintext.starts_with(API_KEY_PREFIX));
        let token = &issued.plaintext[API_KEY_PREFIX.len()..];
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(issued.record.identifier, "key_1");
        assert_eq!(issued.record.scopes, vec!["read".to_string()]);
        assert!(issued.record.expires_at.is_none());
    }

    #[test]
    fn test_record_stores_hash_not_plaintext() {
        let (issuer, hasher) = issuer();
        let issued = issuer.issue("key_1", Vec::new(), None);

        assert!(!issued.record.hash.is_legacy());
        assert!(!issued.record.hash.to_string().contains(issued.plaintext.as_str()));
        assert_eq!(
            hasher.compare(&issued.plaintext, &issued.record.hash),
            Comparison::Current
        );
    }

    #[test]
    fn test_keys_are_unique_and_expire() {
        let (issuer, _) = issuer();
        let a = issuer.issue("a", Vec::new(), Some(Duration::days(30)));
        let b = issuer.issue("b", Vec::new(), None);

        assert_ne!(*a.plaintext, *b.plaintext);
        let expires = a.record.expires_at.unwrap();
        assert!(expires > Utc::now() + Duration::days(29));
    }
}
