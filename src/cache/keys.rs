//! Key Derivation Module
//!
//! Turns call-site parameters into fixed-width store keys. Parameters are
//! never concatenated into the key; they are encoded canonically (type tag
//! plus length prefix for every node) and hashed with SHA-256, so quotes,
//! separators and glob characters in a parameter can never reach the
//! store or collide with an unrelated entry.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::cache::CacheValue;
use crate::error::{CacheError, Result};

// == Public Constants ==
/// Separator between a prefix and the derived token
pub const NAMESPACE_SEPARATOR: char = ':';

/// Maximum allowed key length in bytes, namespace included
pub const MAX_KEY_LENGTH: usize = 512;

/// Number of digest bytes kept in a derived token (32 hex chars)
pub const TOKEN_BYTES: usize = 16;

/// Characters with special meaning in store glob patterns
const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '\\'];

const DOMAIN: &[u8] = b"secure_cache.key.v1";

/// Derives the store key for `params` under `prefix`.
///
/// Equal parameter trees always derive the same key; mapping order does not
/// matter because mappings are kept sorted.
pub fn derive(prefix: &str, params: &CacheValue) -> Result<String> {
    validate_prefix(prefix)?;

    let mut hasher = Sha256::new();
    hasher.update(DOMAIN);
    encode(params, &mut hasher);
    let digest = hasher.finalize();

    Ok(format!(
        "{}{}{}",
        prefix,
        NAMESPACE_SEPARATOR,
        hex::encode(&digest[..TOKEN_BYTES])
    ))
}

/// Derives a key from any serializable parameter set.
pub fn derive_from<T: Serialize + ?Sized>(prefix: &str, params: &T) -> Result<String> {
    derive(prefix, &CacheValue::from_serialize(params)?)
}

fn encode(value: &CacheValue, hasher: &mut Sha256) {
    match value {
        CacheValue::Null => hasher.update(b"n"),
        CacheValue::Bool(false) => hasher.update(b"f"),
        CacheValue::Bool(true) => hasher.update(b"t"),
        CacheValue::Number(n) => {
            // Integers and floats are different parameters even if numerically equal.
            hasher.update(if n.is_f64() { b"d" } else { b"i" });
            // -0.0 == 0.0, so both must derive the same key
            let text = match n.as_f64() {
                Some(f) if n.is_f64() && f == 0.0 => "0.0".to_string(),
                _ => n.to_string(),
            };
            encode_bytes(text.as_bytes(), hasher);
        }
        CacheValue::String(s) => {
            hasher.update(b"s");
            encode_bytes(s.as_bytes(), hasher);
        }
        CacheValue::Sequence(items) => {
            hasher.update(b"l");
            hasher.update((items.len() as u64).to_be_bytes());
            for item in items {
                encode(item, hasher);
            }
        }
        CacheValue::Mapping(map) => {
            hasher.update(b"m");
            hasher.update((map.len() as u64).to_be_bytes());
            for (key, item) in map {
                encode_bytes(key.as_bytes(), hasher);
                encode(item, hasher);
            }
        }
    }
}

fn encode_bytes(bytes: &[u8], hasher: &mut Sha256) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

// == Validation ==
/// A prefix may only hold `[A-Za-z0-9_.:-]`.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(CacheError::InvalidKey("prefix cannot be empty".to_string()));
    }
    if prefix.len() > MAX_KEY_LENGTH / 2 {
        return Err(CacheError::InvalidKey(format!(
            "prefix exceeds {} bytes",
            MAX_KEY_LENGTH / 2
        )));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-');
    if let Some(bad) = prefix.chars().find(|c| !allowed(*c)) {
        return Err(CacheError::InvalidKey(format!(
            "prefix contains disallowed character {:?}",
            bad
        )));
    }
    Ok(())
}

/// Checks a literal key: bounded length, no control characters, whitespace
/// or glob metacharacters.
pub fn validate_key(key: &str) -> Result<()> {
    check_common(key, "key")?;
    if let Some(bad) = key.chars().find(|c| GLOB_CHARS.contains(c)) {
        return Err(CacheError::InvalidKey(format!(
            "key contains glob character {:?}",
            bad
        )));
    }
    Ok(())
}

/// Checks a glob pattern; glob metacharacters are allowed here.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    check_common(pattern, "pattern")
}

fn check_common(key: &str, what: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey(format!("{} cannot be empty", what)));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "{} exceeds maximum length of {} bytes",
            what, MAX_KEY_LENGTH
        )));
    }
    if key.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(CacheError::InvalidKey(format!(
            "{} contains control or whitespace characters",
            what
        )));
    }
    Ok(())
}
