//! Transaction pool (mempool) for pending transactions
//!
//! Holds unconfirmed transactions that would be valid in the next block.
//! Lock-time checks run through the chain's admission gate against the
//! snapshot of the next block, so a transaction accepted here is accepted
//! by block connection at that height too.

use crate::core::admission::AdmissionError;
use crate::core::block::Block;
use crate::core::chain_state::{check_transaction_id, verify_conditions, ChainError, ChainState};
use crate::core::error::ErrorKind;
use crate::core::transaction::{OutPoint, Transaction};
use std::collections::HashMap;
use thiserror::Error;

// =============================================================================
// Configuration
// =============================================================================

/// Default maximum mempool transaction count
pub const DEFAULT_MEMPOOL_SIZE: usize = 10000;

// =============================================================================
// Error Types
// =============================================================================

/// Mempool errors
#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("Transaction already exists")]
    DuplicateTransaction,
    #[error("Coinbase transactions are only valid in blocks")]
    Coinbase,
    #[error("Output {0} is already spent by a pending transaction")]
    Conflict(OutPoint),
    #[error("Mempool full")]
    MempoolFull,
    #[error("{0}")]
    Rejected(#[from] AdmissionError),
    #[error("Invalid transaction: {0}")]
    Invalid(#[from] ChainError),
}

impl MempoolError {
    /// Lock-time rejection kind, if this failure is one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            MempoolError::Rejected(e) => Some(e.kind()),
            MempoolError::Invalid(e) => e.kind(),
            _ => None,
        }
    }
}

// =============================================================================
// Mempool Entry
// =============================================================================

/// Entry in the mempool with metadata
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    /// The transaction
    pub tx: Transaction,
    /// When the transaction was added (Unix timestamp)
    pub added_time: i64,
    /// Chain height when the transaction was last checked
    pub height: u64,
}

// =============================================================================
// Mempool
// =============================================================================

#[derive(Debug)]
pub struct Mempool {
    /// Transactions indexed by ID
    entries: HashMap<String, MempoolEntry>,
    /// Transaction IDs in order of arrival
    by_time: Vec<String>,
    /// Outputs spent by pooled transactions
    spent: HashMap<OutPoint, String>,
    /// Maximum pool size
    max_size: usize,
}

impl Mempool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMPOOL_SIZE)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_time: Vec::new(),
            spent: HashMap::new(),
            max_size,
        }
    }

    /// Validate `tx` against the next block on `chain` and add it
    pub fn add_transaction(
        &mut self,
        tx: Transaction,
        chain: &ChainState,
    ) -> Result<(), MempoolError> {
        if self.entries.contains_key(&tx.id) {
            return Err(MempoolError::DuplicateTransaction);
        }

        if tx.is_coinbase {
            return Err(MempoolError::Coinbase);
        }

        for input in &tx.inputs {
            if self.spent.contains_key(&input.previous_output) {
                return Err(MempoolError::Conflict(input.previous_output.clone()));
            }
        }

        Self::check(&tx, chain)?;

        if self.entries.len() >= self.max_size {
            return Err(MempoolError::MempoolFull);
        }

        log::debug!("Accepted {} into mempool", tx.id);

        let tx_id = tx.id.clone();
        for input in &tx.inputs {
            self.spent
                .insert(input.previous_output.clone(), tx_id.clone());
        }
        self.by_time.push(tx_id.clone());
        self.entries.insert(
            tx_id,
            MempoolEntry {
                tx,
                added_time: chrono::Utc::now().timestamp(),
                height: chain.height(),
            },
        );

        Ok(())
    }

    /// Lock-time and script checks for the next block on `chain`
    fn check(tx: &Transaction, chain: &ChainState) -> Result<(), MempoolError> {
        check_transaction_id(tx)?;
        let maturity = chain.maturity_for(tx)?;
        let snapshot = chain.next_block_snapshot().map_err(ChainError::from)?;
        chain.gate().admit(tx, &maturity, &snapshot)?;
        verify_conditions(chain.utxos(), tx)?;
        Ok(())
    }

    /// Remove a transaction from the pool
    pub fn remove_transaction(&mut self, tx_id: &str) -> Option<Transaction> {
        let entry = self.entries.remove(tx_id)?;
        self.by_time.retain(|id| id != tx_id);
        for input in &entry.tx.inputs {
            self.spent.remove(&input.previous_output);
        }
        Some(entry.tx)
    }

    /// Drop transactions included in `block` or spending the same outputs
    pub fn remove_for_block(&mut self, block: &Block) {
        for tx in &block.transactions {
            self.remove_transaction(&tx.id);
            if tx.is_valid_coinbase() {
                continue;
            }
            for input in &tx.inputs {
                if let Some(conflict) = self.spent.get(&input.previous_output).cloned() {
                    self.remove_transaction(&conflict);
                }
            }
        }
    }

    /// Re-run admission against the current tip, evicting what no longer
    /// passes. Entries already checked at this height are skipped.
    /// Returns the evicted transactions.
    pub fn revalidate(&mut self, chain: &ChainState) -> Vec<Transaction> {
        let height = chain.height();
        let mut stale = Vec::new();
        for id in &self.by_time {
            if let Some(entry) = self.entries.get_mut(id) {
                if entry.height == height {
                    continue;
                }
                if Self::check(&entry.tx, chain).is_err() {
                    stale.push(id.clone());
                } else {
                    entry.height = height;
                }
            }
        }

        stale
            .iter()
            .filter_map(|id| self.remove_transaction(id))
            .collect()
    }

    /// Get transactions for mining (FIFO order, up to limit)
    pub fn get_transactions(&self, limit: usize) -> Vec<Transaction> {
        self.by_time
            .iter()
            .take(limit)
            .filter_map(|id| self.entries.get(id).map(|e| e.tx.clone()))
            .collect()
    }

    pub fn get_entry(&self, id: &str) -> Option<&MempoolEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
