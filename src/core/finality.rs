//! Absolute lock-time finality (BIP113)
//!
//! Time-based lock-times are compared against the median time past of the
//! chain rather than the timestamp of the block that would include the
//! transaction.

use crate::core::admission::ChainSnapshot;
use crate::core::transaction::{LockTime, Transaction};

/// Check whether `tx` may be included in the block described by `snapshot`.
///
/// A lock-time is satisfied only when strictly below the comparison value:
/// a time lock equal to the median time past is not yet final.
pub fn is_final(tx: &Transaction, snapshot: &ChainSnapshot) -> bool {
    // Locktime 0 means always final
    if tx.lock_time == 0 {
        return true;
    }

    // If all inputs have final sequence, locktime is disabled
    if tx.inputs.iter().all(|i| i.is_final()) {
        return true;
    }

    match tx.lock_time() {
        LockTime::Height(height) => (height as i64) < snapshot.height,
        LockTime::Time(time) => (time as i64) < snapshot.median_time_past,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sequence::SEQUENCE_FINAL;
    use crate::core::transaction::{OutPoint, TransactionBuilder, LOCKTIME_THRESHOLD};

    const MTP: i64 = 1_700_000_000;

    fn snapshot() -> ChainSnapshot {
        ChainSnapshot::new(300, MTP)
    }

    fn locked_tx(lock_time: u32) -> Transaction {
        TransactionBuilder::new()
            .version(1)
            .add_input_with_sequence(OutPoint::new("fund", 0), 0)
            .lock_time(lock_time)
            .build()
    }

    #[test]
    fn test_zero_lock_time_is_final() {
        let tx = locked_tx(0);
        assert!(is_final(&tx, &ChainSnapshot::new(0, 0)));
    }

    #[test]
    fn test_time_lock_boundary() {
        assert!(is_final(&locked_tx((MTP - 1) as u32), &snapshot()));
        assert!(!is_final(&locked_tx(MTP as u32), &snapshot()));
        assert!(!is_final(&locked_tx((MTP + 1) as u32), &snapshot()));
    }

    #[test]
    fn test_height_lock_boundary() {
        assert!(is_final(&locked_tx(299), &snapshot()));
        assert!(!is_final(&locked_tx(300), &snapshot()));
        assert!(!is_final(&locked_tx(301), &snapshot()));
    }

    #[test]
    fn test_time_lock_ignores_height() {
        // A huge height must not satisfy a timestamp lock
        let snapshot = ChainSnapshot::new(i64::from(u32::MAX), LOCKTIME_THRESHOLD as i64);
        assert!(!is_final(&locked_tx(LOCKTIME_THRESHOLD), &snapshot));
    }

    #[test]
    fn test_final_sequences_disable_lock_time() {
        let tx = TransactionBuilder::new()
            .add_input(OutPoint::new("a", 0))
            .add_input(OutPoint::new("b", 0))
            .lock_time((MTP + 1000) as u32)
            .build();
        assert!(is_final(&tx, &snapshot()));
    }

    #[test]
    fn test_one_non_final_sequence_keeps_lock_time() {
        // Disable bit alone is not the legacy final sequence
        let tx = TransactionBuilder::new()
            .add_input(OutPoint::new("a", 0))
            .add_input_with_sequence(OutPoint::new("b", 0), SEQUENCE_FINAL - 1)
            .lock_time((MTP + 1000) as u32)
            .build();
        assert!(!is_final(&tx, &snapshot()));
    }
}
