//! Median Time Past (BIP113)
//!
//! Lock-time finality is measured against the median timestamp of the most
//! recent blocks rather than the timestamp of the block being built.

use std::collections::VecDeque;
use thiserror::Error;

use crate::core::error::ErrorKind;

/// Number of blocks used for Median Time Past calculation (Bitcoin uses 11)
pub const MTP_BLOCK_COUNT: usize = 11;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MedianTimeError {
    #[error("median time past requested before any block was recorded")]
    InsufficientHistory,
}

impl MedianTimeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InsufficientHistory
    }
}

/// Sliding window over the most recent block timestamps
#[derive(Debug, Clone)]
pub struct MedianTimePastTracker {
    window: VecDeque<i64>,
    span: usize,
}

impl MedianTimePastTracker {
    pub fn new() -> Self {
        Self::with_span(MTP_BLOCK_COUNT)
    }

    /// Tracker over a custom window length (at least one block)
    pub fn with_span(span: usize) -> Self {
        let span = span.max(1);
        Self {
            window: VecDeque::with_capacity(span + 1),
            span,
        }
    }

    /// Record the timestamp of a newly connected block, evicting the oldest
    /// once the window is full.
    pub fn push_block(&mut self, timestamp: i64) {
        self.window.push_back(timestamp);
        while self.window.len() > self.span {
            self.window.pop_front();
        }
    }

    /// Median of the recorded timestamps.
    ///
    /// The sorted copy is indexed at `len / 2`; with an even count this picks
    /// the later of the two middle values and never averages.
    pub fn median(&self) -> Result<i64, MedianTimeError> {
        if self.window.is_empty() {
            return Err(MedianTimeError::InsufficientHistory);
        }

        let mut sorted: Vec<i64> = self.window.iter().copied().collect();
        sorted.sort();
        Ok(sorted[sorted.len() / 2])
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn span(&self) -> usize {
        self.span
    }

    /// Timestamps in connection order, oldest first
    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.window.iter().copied()
    }
}

impl Default for MedianTimePastTracker {
    fn default() -> Self {
        Self::new()
    }
}
