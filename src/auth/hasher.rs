//! Credential Hashing Module
//!
//! Two hash generations coexist during migration:
//! - `Current`: HMAC-SHA256 keyed with the server secret
//! - `Legacy`: bare SHA-256 of the secret, from before the migration
//!
//! Stored hashes carry a scheme marker (`hmac-sha256$<hex>` or
//! `sha256$<hex>`). An unmarked 64-char hex digest is read as legacy.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::auth::secret::ServerSecret;
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

const CURRENT_SCHEME: &str = "hmac-sha256";
const LEGACY_SCHEME: &str = "sha256";
const DIGEST_HEX_LEN: usize = 64;

// == Stored Hash ==
/// A credential hash tagged with its generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StoredHash {
    Current(String),
    Legacy(String),
}

impl StoredHash {
    pub fn is_legacy(&self) -> bool {
        matches!(self, StoredHash::Legacy(_))
    }

    fn digest(&self) -> &str {
        match self {
            StoredHash::Current(hex) | StoredHash::Legacy(hex) => hex,
        }
    }
}

fn is_digest(hex: &str) -> bool {
    hex.len() == DIGEST_HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

impl FromStr for StoredHash {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, hex) = match s.split_once('$') {
            Some((CURRENT_SCHEME, hex)) => (CURRENT_SCHEME, hex),
            Some((LEGACY_SCHEME, hex)) => (LEGACY_SCHEME, hex),
            Some((other, _)) => {
                return Err(AuthError::Internal(format!("unknown hash scheme: {}", other)))
            }
            None => (LEGACY_SCHEME, s),
        };

        if !is_digest(hex) {
            return Err(AuthError::Internal("malformed hash digest".to_string()));
        }
        let hex = hex.to_ascii_lowercase();
        Ok(if tag == CURRENT_SCHEME {
            StoredHash::Current(hex)
        } else {
            StoredHash::Legacy(hex)
        })
    }
}

impl TryFrom<String> for StoredHash {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StoredHash> for String {
    fn from(hash: StoredHash) -> Self {
        hash.to_string()
    }
}

impl fmt::Display for StoredHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredHash::Current(hex) => write!(f, "{}${}", CURRENT_SCHEME, hex),
            StoredHash::Legacy(hex) => write!(f, "{}${}", LEGACY_SCHEME, hex),
        }
    }
}

// == Comparison ==
/// Which generation, if any, a presented secret matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Current,
    Legacy,
    Mismatch,
}

// == Secret Hasher ==
/// Hashes and compares credential secrets under one server secret.
#[derive(Clone)]
pub struct SecretHasher {
    keyed: HmacSha256,
}

impl SecretHasher {
    pub fn new(secret: &ServerSecret) -> Result<Self, AuthError> {
        let keyed = HmacSha256::new_from_slice(secret.expose())
            .map_err(|e| AuthError::Internal(format!("HMAC initialization failed: {}", e)))?;
        Ok(Self { keyed })
    }

    /// Current-generation hash of `plaintext`; used for every new secret.
    pub fn hash(&self, plaintext: &str) -> StoredHash {
        StoredHash::Current(self.hmac_hex(plaintext))
    }

    /// Pre-migration hash of `plaintext`.
    pub fn legacy_hash(plaintext: &str) -> StoredHash {
        StoredHash::Legacy(legacy_hex(plaintext))
    }

    fn hmac_hex(&self, plaintext: &str) -> String {
        let mut mac = self.keyed.clone();
        mac.update(plaintext.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Compares `plaintext` against `stored` in constant time.
    ///
    /// Both generations are always computed so the work done does not
    /// depend on which generation the record holds.
    pub fn compare(&self, plaintext: &str, stored: &StoredHash) -> Comparison {
        let current = self.hmac_hex(plaintext);
        let legacy = legacy_hex(plaintext);

        let candidate = match stored {
            StoredHash::Current(_) => &current,
            StoredHash::Legacy(_) => &legacy,
        };
        let matched: bool = candidate.as_bytes().ct_eq(stored.digest().as_bytes()).into();

        match (matched, stored) {
            (false, _) => Comparison::Mismatch,
            (true, StoredHash::Current(_)) => Comparison::Current,
            (true, StoredHash::Legacy(_)) => Comparison::Legacy,
        }
    }
}

impl fmt::Debug for SecretHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHasher")
    }
}

fn legacy_hex(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}
