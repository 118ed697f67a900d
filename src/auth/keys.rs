//! API key generation and verification.
//!
//! A key is 32 bytes from the OS RNG, hex encoded (64 characters). The hub
//! stores only SHA-256 digests; the raw key is shown to the CLI once and
//! never logged or persisted.

use anyhow::{Context, Result};
use rand::{RngCore, rngs::OsRng};
use secrecy::SecretString;
use sha2::{Digest, Sha256};

const API_KEY_BYTES: usize = 32;

/// Digest compared against when a user has no keys, so a miss costs the
/// same as a mismatch.
const DUMMY_DIGEST: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Mint a new API key.
///
/// The raw value is only ever handed to the CLI; everywhere else the hub
/// keeps a hash.
///
/// # Errors
/// Returns an error if the OS RNG fails.
pub fn generate_api_key() -> Result<SecretString> {
    let mut bytes = [0u8; API_KEY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate api key")?;
    Ok(SecretString::from(hex::encode(bytes)))
}

/// Hash an API key for storage or lookup.
///
/// Keys are high-entropy random values, a single unsalted SHA-256 pass is
/// enough.
#[must_use]
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two digests without short-circuiting on the first difference.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Check a presented key against a user's stored digests.
///
/// An empty digest list still burns one comparison so the timing does not
/// reveal whether any keys exist.
#[must_use]
pub fn verify_api_key(presented: &str, stored_digests: &[String]) -> bool {
    let digest = hash_api_key(presented);

    if stored_digests.is_empty() {
        return constant_time_eq(&digest, DUMMY_DIGEST);
    }

    let mut matched = false;
    for stored in stored_digests {
        if constant_time_eq(&digest, stored) {
            matched = true;
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn generated_key_is_64_hex_chars() {
        let key = generate_api_key().unwrap();
        let raw = key.expose_secret();
        assert_eq!(raw.len(), 64);
        assert!(raw.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_keys_differ() {
        let first = generate_api_key().unwrap();
        let second = generate_api_key().unwrap();
        assert_ne!(first.expose_secret(), second.expose_secret());
    }

    #[test]
    fn digest_is_stable_and_hex() {
        let digest = hash_api_key("abc");
        assert_eq!(digest, hash_api_key("abc"));
        assert_eq!(digest.len(), 64);
        assert_ne!(digest, hash_api_key("abd"));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq("deadbeef", "deadbeef"));
        assert!(!constant_time_eq("deadbeef", "deadbeee"));
        assert!(!constant_time_eq("dead", "deadbeef"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn verify_matches_only_stored_digest() {
        let key = generate_api_key().unwrap();
        let stored = vec![hash_api_key("other"), hash_api_key(key.expose_secret())];

        assert!(verify_api_key(key.expose_secret(), &stored));
        assert!(!verify_api_key("not-the-key", &stored));
        assert!(!verify_api_key(key.expose_secret(), &[]));
    }
}
