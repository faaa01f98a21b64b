//! Rejection kinds shared by the lock-time validation components

use std::fmt;

/// The category of a lock-time validation failure.
///
/// Every error type in [`crate::core`] maps onto one of these through its
/// `kind()` method so callers can branch on the category without matching
/// individual error payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NonFinalTransaction,
    PrematureSequenceLock,
    SequenceOverflow,
    MaturityDataMismatch,
    InsufficientHistory,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NonFinalTransaction => "NON_FINAL_TRANSACTION",
            ErrorKind::PrematureSequenceLock => "PREMATURE_SEQUENCE_LOCK",
            ErrorKind::SequenceOverflow => "SEQUENCE_OVERFLOW",
            ErrorKind::MaturityDataMismatch => "MATURITY_DATA_MISMATCH",
            ErrorKind::InsufficientHistory => "INSUFFICIENT_HISTORY",
        }
    }

    /// Contract violations by the caller rather than a property of the
    /// transaction. A batch hitting one of these must be abandoned.
    ///
    /// `InsufficientHistory` is not fatal: an empty window only happens
    /// before genesis, which callers handle themselves.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::MaturityDataMismatch)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
