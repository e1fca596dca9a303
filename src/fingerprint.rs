//! Content fingerprint — deterministic cache key over comment text + label.
//!
//! Normalization lowercases and collapses whitespace so trivially different
//! comments ("Love it!!" vs "love  it!!") share a cache entry. No salts:
//! the fingerprint must be stable across process restarts.

use sha2::{Digest, Sha256};

use crate::classify::Classification;

/// Lowercase and collapse all whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compute the cache fingerprint for a comment text and its classification.
///
/// Pure and deterministic: same inputs always yield the same hex digest.
pub fn fingerprint(text: &str, classification: Classification) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    hasher.update(b"\n");
    hasher.update(classification.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
