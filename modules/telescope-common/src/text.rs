//! Text normalization and content hashing for the exact-match dedup path.

use sha2::{Digest, Sha256};

/// Normalize text for hashing: lowercase, collapse whitespace runs to
/// single spaces, trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA-256 hex digest of the normalized text. Messages with equal digests
/// are grouped without any further comparison.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hex::encode(hasher.finalize())
}
