//! Lock-time spending conditions for transaction outputs
//!
//! Outputs may carry a CHECKLOCKTIMEVERIFY (BIP65) or CHECKSEQUENCEVERIFY
//! (BIP112) condition. These only check that the spending transaction
//! *commits* to a lock at least as long as the one required; the commitment
//! itself is enforced by the admission gate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::sequence::{
    SEQUENCE_FINAL, SEQUENCE_LOCKTIME_DISABLE_FLAG, SEQUENCE_LOCKTIME_MASK,
    SEQUENCE_LOCKTIME_TYPE_FLAG,
};
use crate::core::sequence_lock::SEQUENCE_LOCK_MIN_VERSION;
use crate::core::transaction::{Transaction, LOCKTIME_THRESHOLD};

// =============================================================================
// Script Errors
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("negative lock time {0}")]
    NegativeLockTime(i64),
    #[error("input {0} does not exist")]
    MissingInput(usize),
    #[error("locktime requirement not satisfied: {0}")]
    UnsatisfiedLockTime(String),
}

// =============================================================================
// Spend Conditions
// =============================================================================

/// Condition attached to an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpendCondition {
    /// No lock-time requirement
    #[default]
    Anyone,
    /// The spender's nLockTime must be at least this value, of the same kind
    CheckLockTimeVerify(i64),
    /// The spending input's sequence must encode at least this relative lock
    CheckSequenceVerify(i64),
}

impl SpendCondition {
    pub fn name(&self) -> &'static str {
        match self {
            SpendCondition::Anyone => "anyone",
            SpendCondition::CheckLockTimeVerify(_) => "cltv",
            SpendCondition::CheckSequenceVerify(_) => "csv",
        }
    }
}

/// Check `condition` for the output spent by `tx.inputs[input_index]`
pub fn verify_spend_condition(
    condition: &SpendCondition,
    tx: &Transaction,
    input_index: usize,
) -> Result<(), ScriptError> {
    match condition {
        SpendCondition::Anyone => Ok(()),
        SpendCondition::CheckLockTimeVerify(required) => {
            check_lock_time_verify(tx, input_index, *required)
        }
        SpendCondition::CheckSequenceVerify(required) => {
            check_sequence_verify(tx, input_index, *required)
        }
    }
}

/// Shared comparison for both opcodes: the transaction value and the
/// required value must be on the same side of `threshold`, and the
/// transaction value must not be smaller.
pub fn verify_lock_time(tx_value: i64, threshold: i64, required: i64) -> Result<(), ScriptError> {
    let same_kind = (tx_value < threshold && required < threshold)
        || (tx_value >= threshold && required >= threshold);
    if !same_kind {
        return Err(ScriptError::UnsatisfiedLockTime(format!(
            "lock kinds differ (tx {}, required {})",
            tx_value, required
        )));
    }

    if required > tx_value {
        return Err(ScriptError::UnsatisfiedLockTime(format!(
            "tx commits to {}, output requires {}",
            tx_value, required
        )));
    }

    Ok(())
}

/// BIP65 check
pub fn check_lock_time_verify(
    tx: &Transaction,
    input_index: usize,
    required: i64,
) -> Result<(), ScriptError> {
    if required < 0 {
        return Err(ScriptError::NegativeLockTime(required));
    }

    let input = tx
        .inputs
        .get(input_index)
        .ok_or(ScriptError::MissingInput(input_index))?;

    verify_lock_time(tx.lock_time as i64, LOCKTIME_THRESHOLD as i64, required)?;

    // A final sequence would let the lock time be bypassed
    if input.sequence == SEQUENCE_FINAL {
        return Err(ScriptError::UnsatisfiedLockTime(
            "input sequence is final".to_string(),
        ));
    }

    Ok(())
}

/// BIP112 check
pub fn check_sequence_verify(
    tx: &Transaction,
    input_index: usize,
    required: i64,
) -> Result<(), ScriptError> {
    if required < 0 {
        return Err(ScriptError::NegativeLockTime(required));
    }

    // Disabled requirement behaves as a no-op
    if required & SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 != 0 {
        return Ok(());
    }

    let input = tx
        .inputs
        .get(input_index)
        .ok_or(ScriptError::MissingInput(input_index))?;

    if tx.version < SEQUENCE_LOCK_MIN_VERSION {
        return Err(ScriptError::UnsatisfiedLockTime(format!(
            "transaction version {} does not enforce sequence locks",
            tx.version
        )));
    }

    if input.sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Err(ScriptError::UnsatisfiedLockTime(
            "input sequence has relative lock disabled".to_string(),
        ));
    }

    let mask = (SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK) as i64;
    verify_lock_time(
        input.sequence as i64 & mask,
        SEQUENCE_LOCKTIME_TYPE_FLAG as i64,
        required & mask,
    )
}

// =============================================================================
// Tests
// =============================================================================
