//! Content hashing for cache keys.

use sha2::{Digest, Sha256};

/// SHA256 of a statement's canonical text.
///
/// Returns a 64-character lowercase hexadecimal string. Statements that
/// compile to the same model share a fingerprint however they were written.
pub fn fingerprint(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}
