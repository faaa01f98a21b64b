//! Transaction handling
//!
//! Implements the UTXO transaction model the lock-time rules operate on:
//! - Absolute lock-time (nLockTime), height or timestamp
//! - Per-input sequence numbers carrying relative lock-times (BIP68)
//! - Transaction versioning (relative locks need version 2)

use crate::core::script::SpendCondition;
use crate::core::sequence::SEQUENCE_FINAL;
use crate::crypto::double_sha256_hex;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Default transaction version; version 2 enables BIP68 sequence locks
pub const TX_VERSION: i32 = 2;

/// Locktime threshold: values below are block heights, above are timestamps
/// (500 million, same as Bitcoin)
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

// =============================================================================
// Lock Time
// =============================================================================

/// Classified absolute lock-time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockTime {
    /// Transaction is valid in blocks above this height
    Height(u32),
    /// Transaction is valid once median time past exceeds this timestamp
    Time(u32),
}

impl LockTime {
    pub fn from_consensus(value: u32) -> Self {
        if value < LOCKTIME_THRESHOLD {
            LockTime::Height(value)
        } else {
            LockTime::Time(value)
        }
    }

    pub fn to_consensus_u32(self) -> u32 {
        match self {
            LockTime::Height(v) | LockTime::Time(v) => v,
        }
    }

    pub fn is_block_height(self) -> bool {
        matches!(self, LockTime::Height(_))
    }
}

// =============================================================================
// Outpoint
// =============================================================================

/// Reference to an output of a previous transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: String,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(tx_id: impl Into<String>, vout: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            vout,
        }
    }

    /// The outpoint used by coinbase inputs
    pub fn null(vout: u32) -> Self {
        Self::new("0".repeat(64), vout)
    }

    pub fn is_null(&self) -> bool {
        self.tx_id.len() == 64 && self.tx_id.bytes().all(|b| b == b'0')
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.vout)
    }
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input (reference to previous output)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionInput {
    pub previous_output: OutPoint,
    /// Sequence number
    /// - SEQUENCE_FINAL (0xFFFFFFFF): final input, disables nLockTime if all inputs are final
    /// - disable bit clear: relative lock-time for version 2 transactions
    #[serde(default = "default_sequence")]
    pub sequence: u32,
    /// Unlocking data, opaque to lock-time validation
    #[serde(default)]
    pub witness: Vec<String>,
}

fn default_sequence() -> u32 {
    SEQUENCE_FINAL
}

impl TransactionInput {
    pub fn new(previous_output: OutPoint, sequence: u32) -> Self {
        Self {
            previous_output,
            sequence,
            witness: Vec::new(),
        }
    }

    /// Check if this input uses the final sequence number
    pub fn is_final(&self) -> bool {
        self.sequence == SEQUENCE_FINAL
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionOutput {
    /// Amount of coins
    pub amount: u64,
    /// Recipient's address
    pub recipient: String,
    /// Lock-time condition the spender must satisfy
    #[serde(default)]
    pub condition: SpendCondition,
}

impl TransactionOutput {
    pub fn new(recipient: &str, amount: u64) -> Self {
        Self {
            amount,
            recipient: recipient.to_string(),
            condition: SpendCondition::Anyone,
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Transaction version
    #[serde(default = "default_version")]
    pub version: i32,
    /// Transaction ID; computed from the contents when left empty
    #[serde(default)]
    pub id: String,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Locktime: block height or timestamp when tx becomes valid
    /// - 0: transaction is always valid
    /// - < LOCKTIME_THRESHOLD: block height
    /// - >= LOCKTIME_THRESHOLD: Unix timestamp
    #[serde(default)]
    pub lock_time: u32,
    /// Whether this is a coinbase transaction
    #[serde(default)]
    pub is_coinbase: bool,
}

fn default_version() -> i32 {
    TX_VERSION
}

impl Transaction {
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        let mut tx = Self {
            version: TX_VERSION,
            id: String::new(),
            inputs,
            outputs,
            lock_time: 0,
            is_coinbase: false,
        };
        tx.id = tx.calculate_hash();
        tx
    }

    /// Create a coinbase transaction; the height keeps coinbase ids unique
    pub fn coinbase(outputs: Vec<TransactionOutput>, block_height: u64) -> Self {
        let mut tx = Self {
            version: TX_VERSION,
            id: String::new(),
            inputs: vec![TransactionInput::new(
                OutPoint::null(block_height as u32),
                SEQUENCE_FINAL,
            )],
            outputs,
            lock_time: 0,
            is_coinbase: true,
        };
        tx.id = tx.calculate_hash();
        tx
    }

    /// Calculate the transaction hash
    pub fn calculate_hash(&self) -> String {
        let data = format!(
            "{}{:?}{:?}{}{}",
            self.version, self.inputs, self.outputs, self.lock_time, self.is_coinbase
        );
        double_sha256_hex(data.as_bytes())
    }

    /// Coinbase flag backed by the coinbase shape: a single input spending
    /// the null outpoint. Only these are exempt from input checks.
    pub fn is_valid_coinbase(&self) -> bool {
        self.is_coinbase
            && self.inputs.len() == 1
            && self.inputs[0].previous_output.is_null()
    }

    /// Whether the id matches the transaction contents
    pub fn has_valid_id(&self) -> bool {
        self.id == self.calculate_hash()
    }

    /// Fill in the id if it was left empty (e.g. a hand-written JSON transaction)
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = self.calculate_hash();
        }
    }

    pub fn lock_time(&self) -> LockTime {
        LockTime::from_consensus(self.lock_time)
    }

    /// Outpoint of one of this transaction's outputs
    pub fn outpoint(&self, vout: u32) -> OutPoint {
        OutPoint::new(self.id.clone(), vout)
    }

    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Builder for creating transactions with all options
pub struct TransactionBuilder {
    version: i32,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    lock_time: u32,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            version: TX_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Add an input with the final sequence
    pub fn add_input(self, previous_output: OutPoint) -> Self {
        self.add_input_with_sequence(previous_output, SEQUENCE_FINAL)
    }

    /// Add an input with custom sequence
    pub fn add_input_with_sequence(mut self, previous_output: OutPoint, sequence: u32) -> Self {
        self.inputs
            .push(TransactionInput::new(previous_output, sequence));
        self
    }

    pub fn add_output(mut self, recipient: &str, amount: u64) -> Self {
        self.outputs.push(TransactionOutput::new(recipient, amount));
        self
    }

    /// Add an output spendable only once `condition` holds
    pub fn add_locked_output(
        mut self,
        recipient: &str,
        amount: u64,
        condition: SpendCondition,
    ) -> Self {
        self.outputs.push(TransactionOutput {
            amount,
            recipient: recipient.to_string(),
            condition,
        });
        self
    }

    /// Set lock time (block height or timestamp)
    pub fn lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = lock_time;
        self
    }

    pub fn build(self) -> Transaction {
        let mut tx = Transaction::new(self.inputs, self.outputs);
        tx.version = self.version;
        tx.lock_time = self.lock_time;
        tx.id = tx.calculate_hash();
        tx
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
