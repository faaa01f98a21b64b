//! Relative lock-time evaluation (BIP68)
//!
//! Turns the sequence numbers of a transaction's inputs, together with the
//! height and median time past at which each spent output confirmed, into
//! the earliest chain position where the transaction may be mined.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::admission::ChainSnapshot;
use crate::core::error::ErrorKind;
use crate::core::sequence::RelativeLock;
use crate::core::transaction::Transaction;

/// Lowest transaction version that enforces sequence locks
pub const SEQUENCE_LOCK_MIN_VERSION: i32 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceLockError {
    #[error("maturity data covers {maturity} outputs but the transaction has {inputs} inputs")]
    MaturityDataMismatch { inputs: usize, maturity: usize },
}

impl SequenceLockError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MaturityDataMismatch
    }
}

/// Where the output spent by an input was confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoMaturity {
    /// Height of the block that contains the output
    pub confirmation_height: i64,
    /// Median time past of the block preceding the confirming block
    pub confirmation_mtp: i64,
}

impl UtxoMaturity {
    pub fn new(confirmation_height: i64, confirmation_mtp: i64) -> Self {
        Self {
            confirmation_height,
            confirmation_mtp,
        }
    }
}

/// Minimum height and median time past a transaction must be strictly
/// below the candidate block for. `-1` leaves that dimension unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceLock {
    pub min_height: i64,
    pub min_time: i64,
}

impl SequenceLock {
    pub const UNCONSTRAINED: SequenceLock = SequenceLock {
        min_height: -1,
        min_time: -1,
    };

    pub fn is_unconstrained(&self) -> bool {
        *self == Self::UNCONSTRAINED
    }

    /// True when a block at `snapshot` may include the transaction
    pub fn is_satisfied(&self, snapshot: &ChainSnapshot) -> bool {
        self.min_height < snapshot.height && self.min_time < snapshot.median_time_past
    }
}

impl Default for SequenceLock {
    fn default() -> Self {
        Self::UNCONSTRAINED
    }
}

/// Compute the combined sequence lock of `tx`.
///
/// `maturity[i]` describes the output spent by `tx.inputs[i]`. Each enabled
/// input yields a lock ending one unit before its requirement is met; the
/// transaction lock is the maximum across inputs, per dimension.
pub fn compute_sequence_lock(
    tx: &Transaction,
    maturity: &[UtxoMaturity],
) -> Result<SequenceLock, SequenceLockError> {
    if maturity.len() != tx.inputs.len() {
        return Err(SequenceLockError::MaturityDataMismatch {
            inputs: tx.inputs.len(),
            maturity: maturity.len(),
        });
    }

    let mut lock = SequenceLock::UNCONSTRAINED;

    if tx.version < SEQUENCE_LOCK_MIN_VERSION {
        return Ok(lock);
    }

    for (input, utxo) in tx.inputs.iter().zip(maturity) {
        match RelativeLock::from_sequence(input.sequence) {
            RelativeLock::Disabled => {}
            RelativeLock::Blocks(n) => {
                let min_height = utxo.confirmation_height + n as i64 - 1;
                lock.min_height = lock.min_height.max(min_height);
            }
            relative @ RelativeLock::Seconds(_) => {
                let seconds = relative.seconds().unwrap_or(0);
                let min_time = utxo.confirmation_mtp + seconds - 1;
                lock.min_time = lock.min_time.max(min_time);
            }
        }
    }

    Ok(lock)
}
