//! Content digests used in drift reports

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute SHA-256 hash and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// First 12 hex characters of the SHA-256, enough to tell two contents apart in a log line
pub fn short_digest(data: &[u8]) -> String {
    let mut hex = sha256_hex(data);
    hex.truncate(12);
    hex
}
