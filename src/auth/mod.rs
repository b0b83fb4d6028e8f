//! Auth Module
//!
//! HMAC credential hashing and enumeration-resistant verification for API
//! keys, with a migration path off legacy unkeyed hashes.

pub mod hasher;
pub mod issuer;
pub mod revocations;
pub mod secret;
pub mod store;
pub mod verifier;

pub use hasher::{Comparison, SecretHasher, StoredHash};
pub use issuer::{ApiKeyIssuer, IssuedKey, API_KEY_PREFIX};
pub use revocations::Revocations;
pub use secret::{SecretPolicy, ServerSecret};
pub use store::{
    parse_credentials, CredentialRecord, CredentialStore, MemoryCredentialStore, CREDENTIALS_ENV,
};
pub use verifier::{
    CredentialVerifier, Principal, TracingObserver, Verification, VerificationObserver,
};
