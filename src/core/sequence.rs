//! Relative lock-time sequence encoding (BIP68)
//!
//! The 32-bit input sequence field packs three things:
//! - bit 31: disables relative lock-time for the input
//! - bit 22: lock type (0 = blocks, 1 = units of 512 seconds)
//! - bits 0..16: the lock value
//!
//! Sequences are decoded once into [`RelativeLock`] and everything downstream
//! branches on that variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::error::ErrorKind;

// =============================================================================
// Constants
// =============================================================================

/// Sequence number that marks an input as final (disables nLockTime too)
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Disables relative lock-time for an input when set
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// When set the lock value counts 512-second units instead of blocks
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// Mask extracting the lock value
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_FFFF;

/// Time-based locks are expressed in units of 2^9 = 512 seconds
pub const SEQUENCE_LOCKTIME_GRANULARITY: u32 = 9;

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("relative lock-time value {0} does not fit in 16 bits")]
    Overflow(i64),
}

impl SequenceError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::SequenceOverflow
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Raw fields extracted from a sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSequence {
    pub disabled: bool,
    pub is_time_based: bool,
    pub value: u16,
}

/// A decoded relative lock-time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelativeLock {
    /// The disable bit is set, the input imposes no constraint
    Disabled,
    /// Number of blocks that must pass after the output confirmed
    Blocks(u16),
    /// Number of 512-second intervals that must pass after the output confirmed
    Seconds(u16),
}

impl From<DecodedSequence> for RelativeLock {
    fn from(decoded: DecodedSequence) -> Self {
        if decoded.disabled {
            RelativeLock::Disabled
        } else if decoded.is_time_based {
            RelativeLock::Seconds(decoded.value)
        } else {
            RelativeLock::Blocks(decoded.value)
        }
    }
}

impl RelativeLock {
    pub fn from_sequence(sequence: u32) -> Self {
        decode(sequence).into()
    }

    /// Encode back into a sequence number. `Disabled` maps to [`SEQUENCE_FINAL`].
    pub fn to_sequence(self) -> u32 {
        match self {
            RelativeLock::Disabled => SEQUENCE_FINAL,
            RelativeLock::Blocks(n) => n as u32,
            RelativeLock::Seconds(n) => SEQUENCE_LOCKTIME_TYPE_FLAG | n as u32,
        }
    }

    /// Lock length in seconds for time-based locks
    pub fn seconds(self) -> Option<i64> {
        match self {
            RelativeLock::Seconds(n) => Some((n as i64) << SEQUENCE_LOCKTIME_GRANULARITY),
            _ => None,
        }
    }
}

/// Pure bit extraction, no failure modes.
pub fn decode(sequence: u32) -> DecodedSequence {
    DecodedSequence {
        disabled: sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0,
        is_time_based: sequence & SEQUENCE_LOCKTIME_TYPE_FLAG != 0,
        value: (sequence & SEQUENCE_LOCKTIME_MASK) as u16,
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a relative lock value that is already in sequence units
/// (blocks, or 512-second intervals).
pub fn encode(is_time_based: bool, value: i64) -> Result<u32, SequenceError> {
    if !(0..=SEQUENCE_LOCKTIME_MASK as i64).contains(&value) {
        return Err(SequenceError::Overflow(value));
    }

    let mut sequence = value as u32;
    if is_time_based {
        sequence |= SEQUENCE_LOCKTIME_TYPE_FLAG;
    }
    Ok(sequence)
}

/// Convert a caller-facing relative lock into a sequence number.
///
/// Seconds are floored to 512-second granularity before encoding, so 511
/// seconds becomes a zero-length lock.
pub fn lock_time_to_sequence(is_seconds: bool, lock_time: i64) -> Result<u32, SequenceError> {
    if !is_seconds {
        return encode(false, lock_time);
    }
    if lock_time < 0 {
        return Err(SequenceError::Overflow(lock_time));
    }
    encode(true, lock_time >> SEQUENCE_LOCKTIME_GRANULARITY)
        .map_err(|_| SequenceError::Overflow(lock_time))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_blocks() {
        assert_eq!(encode(false, 10).unwrap(), 10);
        assert_eq!(encode(false, 0xFFFF).unwrap(), 0xFFFF);
    }

    #[test]
    fn test_encode_seconds_sets_type_flag() {
        let seq = encode(true, 1).unwrap();
        assert_eq!(seq, SEQUENCE_LOCKTIME_TYPE_FLAG | 1);
        assert_eq!(seq & SEQUENCE_LOCKTIME_DISABLE_FLAG, 0);
    }

    #[test]
    fn test_encode_overflow() {
        assert_eq!(encode(false, 0x1_0000), Err(SequenceError::Overflow(0x1_0000)));
        assert_eq!(encode(true, -1), Err(SequenceError::Overflow(-1)));
        assert_eq!(
            encode(false, 0x1_0000).unwrap_err().kind(),
            ErrorKind::SequenceOverflow
        );
    }

    #[test]
    fn test_decode() {
        let decoded = decode(SEQUENCE_LOCKTIME_DISABLE_FLAG | SEQUENCE_LOCKTIME_TYPE_FLAG | 7);
        assert!(decoded.disabled);
        assert!(decoded.is_time_based);
        assert_eq!(decoded.value, 7);

        // Bits outside the defined fields are ignored
        let decoded = decode(0x0001_0005);
        assert!(!decoded.disabled);
        assert!(!decoded.is_time_based);
        assert_eq!(decoded.value, 5);
    }

    #[test]
    fn test_relative_lock_variants() {
        assert_eq!(RelativeLock::from_sequence(SEQUENCE_FINAL), RelativeLock::Disabled);
        assert_eq!(
            RelativeLock::from_sequence(SEQUENCE_LOCKTIME_DISABLE_FLAG | 1),
            RelativeLock::Disabled
        );
        assert_eq!(RelativeLock::from_sequence(10), RelativeLock::Blocks(10));
        assert_eq!(
            RelativeLock::from_sequence(SEQUENCE_LOCKTIME_TYPE_FLAG | 3),
            RelativeLock::Seconds(3)
        );
        assert_eq!(RelativeLock::Seconds(3).seconds(), Some(1536));
        assert_eq!(RelativeLock::Blocks(3).seconds(), None);
    }

    #[test]
    fn test_seconds_granularity() {
        let seq = lock_time_to_sequence(true, 512).unwrap();
        assert_eq!(RelativeLock::from_sequence(seq), RelativeLock::Seconds(1));

        // Sub-512 second precision is dropped
        let seq = lock_time_to_sequence(true, 511).unwrap();
        assert_eq!(RelativeLock::from_sequence(seq), RelativeLock::Seconds(0));

        let seq = lock_time_to_sequence(true, 512_000).unwrap();
        assert_eq!(RelativeLock::from_sequence(seq), RelativeLock::Seconds(1000));
    }

    #[test]
    fn test_lock_time_to_sequence_limits() {
        assert!(lock_time_to_sequence(true, 0xFFFF << 9).is_ok());
        assert_eq!(
            lock_time_to_sequence(true, 0x1_0000 << 9),
            Err(SequenceError::Overflow(0x1_0000 << 9))
        );
        assert!(lock_time_to_sequence(true, -512).is_err());
        assert_eq!(lock_time_to_sequence(false, 1000).unwrap(), 1000);
    }

    #[test]
    fn test_to_sequence_round_trip() {
        for lock in [
            RelativeLock::Blocks(0),
            RelativeLock::Blocks(144),
            RelativeLock::Seconds(1),
            RelativeLock::Disabled,
        ] {
            assert_eq!(RelativeLock::from_sequence(lock.to_sequence()), lock);
        }
    }
}
