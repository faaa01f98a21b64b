//! Block implementation for the chain
//!
//! A block contains a header with metadata and a list of transactions. The
//! header timestamp feeds the median time past window once the block is
//! connected.

use crate::core::transaction::Transaction;
use crate::crypto::{double_sha256_hex, merkle_root_hex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Block header containing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block version
    pub version: u32,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Merkle root of all transaction ids
    pub merkle_root: String,
    /// Block creation timestamp
    pub timestamp: DateTime<Utc>,
}

impl BlockHeader {
    /// Calculate the hash of the block header
    pub fn hash(&self) -> String {
        let data = format!(
            "{}{}{}{}",
            self.version,
            self.previous_hash,
            self.merkle_root,
            self.timestamp.timestamp(),
        );
        double_sha256_hex(data.as_bytes())
    }
}

/// A block in the chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Block index/height
    pub index: u64,
    /// Block header
    pub header: BlockHeader,
    /// Block hash (cached for efficiency)
    pub hash: String,
    /// List of transactions in the block
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        index: u64,
        previous_hash: String,
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
    ) -> Self {
        let header = BlockHeader {
            version: 1,
            previous_hash,
            merkle_root: Self::calculate_merkle_root(&transactions),
            timestamp,
        };
        let hash = header.hash();

        Self {
            index,
            header,
            hash,
            transactions,
        }
    }

    /// Create the genesis block
    pub fn genesis(timestamp: DateTime<Utc>) -> Self {
        let coinbase = Transaction::coinbase(vec![], 0);
        Self::new(0, "0".repeat(64), timestamp, vec![coinbase])
    }

    fn calculate_merkle_root(transactions: &[Transaction]) -> String {
        let ids: Vec<String> = transactions.iter().map(|tx| tx.id.clone()).collect();
        merkle_root_hex(&ids)
    }

    /// Verify the block's merkle root
    pub fn verify_merkle_root(&self) -> bool {
        Self::calculate_merkle_root(&self.transactions) == self.header.merkle_root
    }

    /// Verify the block hash
    pub fn verify_hash(&self) -> bool {
        self.hash == self.header.hash()
    }

    /// Header timestamp as Unix seconds
    pub fn time(&self) -> i64 {
        self.header.timestamp.timestamp()
    }

    /// Get the coinbase transaction (first transaction)
    pub fn coinbase_tx(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_valid_coinbase())
    }
}
