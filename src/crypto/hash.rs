//! Hashing utilities
//!
//! SHA-256 based identifiers for transactions and blocks.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Computes double SHA-256 hash and returns it as a hex string
pub fn double_sha256_hex(data: &[u8]) -> String {
    hex::encode(double_sha256(data))
}

/// Merkle root over a list of identifiers, hex encoded.
///
/// Leaves are the SHA-256 of each identifier string; an odd node at any
/// level is paired with itself.
pub fn merkle_root_hex(ids: &[String]) -> String {
    if ids.is_empty() {
        return hex::encode(sha256(b""));
    }

    let mut level: Vec<Vec<u8>> = ids.iter().map(|id| sha256(id.as_bytes())).collect();

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let mut data = pair[0].clone();
                data.extend_from_slice(pair.get(1).unwrap_or(&pair[0]));
                sha256(&data)
            })
            .collect();
    }

    hex::encode(&level[0])
}
