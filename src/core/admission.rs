//! Transaction admission gate
//!
//! The one place where absolute and relative lock-times are checked against
//! a chain position. Mempool acceptance and block connection both call
//! [`AdmissionGate::admit`] so that policy and consensus cannot drift apart.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConsensusParams;
use crate::core::error::ErrorKind;
use crate::core::finality::is_final;
use crate::core::sequence_lock::{
    compute_sequence_lock, SequenceLock, SequenceLockError, UtxoMaturity,
};
use crate::core::transaction::Transaction;

// =============================================================================
// Chain Snapshot
// =============================================================================

/// The chain position a transaction is validated against.
///
/// For block connection this is the block being connected: its height and
/// the median time past of its parent. For the mempool it is the next block
/// on top of the current tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub height: i64,
    pub median_time_past: i64,
}

impl ChainSnapshot {
    pub fn new(height: i64, median_time_past: i64) -> Self {
        Self {
            height,
            median_time_past,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("transaction {tx_id} is not finalized (lock time {lock_time})")]
    NonFinal { tx_id: String, lock_time: u32 },

    #[error("transaction {tx_id}'s sequence locks on inputs not met")]
    PrematureSequenceLock { tx_id: String, lock: SequenceLock },

    #[error(transparent)]
    Maturity(#[from] SequenceLockError),
}

impl AdmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdmissionError::NonFinal { .. } => ErrorKind::NonFinalTransaction,
            AdmissionError::PrematureSequenceLock { .. } => ErrorKind::PrematureSequenceLock,
            AdmissionError::Maturity(e) => e.kind(),
        }
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Lock-time admission rules for a given network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionGate {
    csv_activation_height: i64,
}

impl AdmissionGate {
    pub fn new(params: &ConsensusParams) -> Self {
        Self {
            csv_activation_height: params.csv_activation_height,
        }
    }

    /// Whether sequence locks apply to a block at `height`
    pub fn enforces_sequence_locks(&self, height: i64) -> bool {
        height >= self.csv_activation_height
    }

    /// Accept or reject `tx` at `snapshot`.
    ///
    /// `maturity[i]` describes the output spent by input `i`. Coinbase
    /// transactions spend nothing and are only checked for finality; the
    /// exemption needs the coinbase shape, not just the flag.
    pub fn admit(
        &self,
        tx: &Transaction,
        maturity: &[UtxoMaturity],
        snapshot: &ChainSnapshot,
    ) -> Result<(), AdmissionError> {
        if !is_final(tx, snapshot) {
            log::debug!(
                "Rejecting {}: lock time {} not reached at height {} / mtp {}",
                tx.id,
                tx.lock_time,
                snapshot.height,
                snapshot.median_time_past
            );
            return Err(AdmissionError::NonFinal {
                tx_id: tx.id.clone(),
                lock_time: tx.lock_time,
            });
        }

        if tx.is_valid_coinbase() || !self.enforces_sequence_locks(snapshot.height) {
            return Ok(());
        }

        let lock = compute_sequence_lock(tx, maturity).map_err(|e| {
            log::warn!("Maturity data for {} is inconsistent: {}", tx.id, e);
            e
        })?;
        if !lock.is_satisfied(snapshot) {
            log::debug!(
                "Rejecting {}: sequence lock {:?} not met at height {} / mtp {}",
                tx.id,
                lock,
                snapshot.height,
                snapshot.median_time_past
            );
            return Err(AdmissionError::PrematureSequenceLock {
                tx_id: tx.id.clone(),
                lock,
            });
        }

        Ok(())
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(&ConsensusParams::default())
    }
}

/// Admit `tx` with sequence locks active from genesis
pub fn admit(
    tx: &Transaction,
    maturity: &[UtxoMaturity],
    snapshot: &ChainSnapshot,
) -> Result<(), AdmissionError> {
    AdmissionGate::default().admit(tx, maturity, snapshot)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sequence::{lock_time_to_sequence, SEQUENCE_FINAL};
    use crate::core::transaction::{OutPoint, TransactionBuilder};

    const MTP: i64 = 1_700_000_000;

    fn spend(version: i32, sequence: u32, lock_time: u32) -> Transaction {
        TransactionBuilder::new()
            .version(version)
            .add_input_with_sequence(OutPoint::new("fund", 0), sequence)
            .add_output("bob", 10)
            .lock_time(lock_time)
            .build()
    }

    #[test]
    fn test_version_one_lock_time_in_future() {
        let tx = spend(1, 0, (MTP + 1) as u32);
        let snapshot = ChainSnapshot::new(300, MTP);
        let err = admit(&tx, &[UtxoMaturity::new(1, 0)], &snapshot).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NonFinalTransaction);
        assert!(err.to_string().contains("not finalized"));
    }

    #[test]
    fn test_block_relative_lock() {
        // Output confirmed at 283, the chain is at 293 and the candidate
        // block is 294, giving the input an age of 11 blocks
        let maturity = [UtxoMaturity::new(283, MTP - 6_000)];
        let snapshot = ChainSnapshot::new(294, MTP);

        let tx = spend(2, 10, 0);
        assert!(admit(&tx, &maturity, &snapshot).is_ok());

        let tx = spend(2, 1000, 0);
        let err = admit(&tx, &maturity, &snapshot).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureSequenceLock);
        assert!(err.to_string().contains("sequence locks on inputs not met"));
    }

    #[test]
    fn test_block_relative_lock_boundary() {
        let maturity = [UtxoMaturity::new(100, 0)];
        let tx = spend(2, 10, 0);

        // Age equal to the requirement is enough
        assert!(admit(&tx, &maturity, &ChainSnapshot::new(110, MTP)).is_ok());
        assert_eq!(
            admit(&tx, &maturity, &ChainSnapshot::new(109, MTP))
                .unwrap_err()
                .kind(),
            ErrorKind::PrematureSequenceLock
        );
    }

    #[test]
    fn test_time_relative_lock_boundary() {
        let tx = spend(2, lock_time_to_sequence(true, 512).unwrap(), 0);

        let trailing_512 = [UtxoMaturity::new(10, MTP - 512)];
        assert!(admit(&tx, &trailing_512, &ChainSnapshot::new(20, MTP)).is_ok());

        let trailing_511 = [UtxoMaturity::new(10, MTP - 511)];
        assert_eq!(
            admit(&tx, &trailing_511, &ChainSnapshot::new(20, MTP))
                .unwrap_err()
                .kind(),
            ErrorKind::PrematureSequenceLock
        );
    }

    #[test]
    fn test_finality_checked_before_sequence_locks() {
        // Both rules fail; the absolute lock is reported
        let tx = spend(2, 1000, (MTP + 10) as u32);
        let err = admit(&tx, &[UtxoMaturity::new(290, MTP)], &ChainSnapshot::new(294, MTP))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonFinalTransaction);
    }

    #[test]
    fn test_mismatch_propagates() {
        let tx = spend(2, 10, 0);
        let err = admit(&tx, &[], &ChainSnapshot::new(294, MTP)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MaturityDataMismatch);
    }

    #[test]
    fn test_activation_height() {
        let params = ConsensusParams {
            csv_activation_height: 500,
            ..ConsensusParams::default()
        };
        let gate = AdmissionGate::new(&params);
        let tx = spend(2, 1000, 0);
        let maturity = [UtxoMaturity::new(290, MTP)];

        assert!(gate.admit(&tx, &maturity, &ChainSnapshot::new(294, MTP)).is_ok());
        assert!(gate.admit(&tx, &maturity, &ChainSnapshot::new(500, MTP)).is_err());
    }

    #[test]
    fn test_verdict_is_deterministic() {
        let tx = spend(2, 5, 0);
        let maturity = [UtxoMaturity::new(10, 0)];
        let snapshot = ChainSnapshot::new(14, MTP);
        let first = admit(&tx, &maturity, &snapshot);
        for _ in 0..3 {
            assert_eq!(admit(&tx, &maturity, &snapshot), first);
        }
    }

    #[test]
    fn test_coinbase_only_needs_finality() {
        let coinbase = Transaction::coinbase(vec![], 7);
        assert!(admit(&coinbase, &[], &ChainSnapshot::new(7, MTP)).is_ok());
        assert_eq!(coinbase.inputs[0].sequence, SEQUENCE_FINAL);
    }

    #[test]
    fn test_coinbase_flag_does_not_skip_sequence_locks() {
        let mut tx = spend(2, 1000, 0);
        tx.is_coinbase = true;
        let snapshot = ChainSnapshot::new(294, MTP);

        let err = admit(&tx, &[UtxoMaturity::new(290, 0)], &snapshot).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureSequenceLock);

        let err = admit(&tx, &[], &snapshot).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MaturityDataMismatch);
    }
}
