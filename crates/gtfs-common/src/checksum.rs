//! Digests for downloaded feed archives
//!
//! The digest of every successfully imported archive is kept in the sync
//! metadata so operators can tell which payload a dataset came from.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of an in-memory payload
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
