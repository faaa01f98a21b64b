//! Cryptographic utilities
//!
//! This module provides SHA-256 hashing for transaction ids, block hashes
//! and merkle roots.

pub mod hash;

pub use hash::{double_sha256, double_sha256_hex, merkle_root_hex, sha256};
