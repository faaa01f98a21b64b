//! Core lock-time validation components
//!
//! This module contains:
//! - Sequence encoding for relative lock-times (BIP68)
//! - Median time past tracking (BIP113)
//! - Sequence lock calculation and absolute lock-time finality
//! - The admission gate shared by mempool and block connection
//! - Lock-time spending conditions (BIP65, BIP112)
//! - Transactions, blocks and chain state

pub mod admission;
pub mod block;
pub mod chain_state;
pub mod error;
pub mod finality;
pub mod median_time;
pub mod script;
pub mod sequence;
pub mod sequence_lock;
pub mod transaction;

pub use admission::{admit, AdmissionError, AdmissionGate, ChainSnapshot};
pub use block::{Block, BlockHeader};
pub use chain_state::{ChainError, ChainState};
pub use error::ErrorKind;
pub use finality::is_final;
pub use median_time::{MedianTimeError, MedianTimePastTracker, MTP_BLOCK_COUNT};
pub use script::{verify_spend_condition, ScriptError, SpendCondition};
pub use sequence::{
    decode, encode, lock_time_to_sequence, DecodedSequence, RelativeLock, SequenceError,
    SEQUENCE_FINAL, SEQUENCE_LOCKTIME_DISABLE_FLAG, SEQUENCE_LOCKTIME_GRANULARITY,
    SEQUENCE_LOCKTIME_MASK, SEQUENCE_LOCKTIME_TYPE_FLAG,
};
pub use sequence_lock::{compute_sequence_lock, SequenceLock, SequenceLockError, UtxoMaturity};
pub use transaction::{
    LockTime, OutPoint, Transaction, TransactionBuilder, TransactionInput, TransactionOutput,
    LOCKTIME_THRESHOLD, TX_VERSION,
};
