//! Cache key generation.
//!
//! Records are keyed by a SHA-256 hash of the normalized absolute URL,
//! so equivalent relative/absolute spellings of one resource share a
//! single row. Normalization happens before this layer.

use sha2::{Digest, Sha256};

/// Compute the storage key for a normalized URL.
pub fn record_key(normalized_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hex::encode(hasher.finalize())
}
