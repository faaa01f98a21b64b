//! Chain-Finality: lock-time and sequence-lock validation in Rust
//!
//! This crate decides when a transaction may enter the mempool or a block:
//! - Relative lock-times encoded in input sequence numbers (BIP68)
//! - Median time past as the clock for time-based locks (BIP113)
//! - CHECKLOCKTIMEVERIFY / CHECKSEQUENCEVERIFY output conditions (BIP65, BIP112)
//! - One admission gate shared by mempool acceptance and block connection
//!
//! # Example
//!
//! ```rust
//! use chain_finality::core::{admit, ChainSnapshot, OutPoint, TransactionBuilder, UtxoMaturity};
//!
//! // Spend an output confirmed at height 100 with a 10 block relative lock
//! let tx = TransactionBuilder::new()
//!     .add_input_with_sequence(OutPoint::new("fund", 0), 10)
//!     .add_output("bob", 50)
//!     .build();
//! let maturity = [UtxoMaturity::new(100, 1_600_000_000)];
//!
//! assert!(admit(&tx, &maturity, &ChainSnapshot::new(109, 1_600_006_000)).is_err());
//! assert!(admit(&tx, &maturity, &ChainSnapshot::new(110, 1_600_006_000)).is_ok());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod storage;

// Re-export commonly used types
pub use config::ConsensusParams;
pub use crate::core::{
    admit, AdmissionError, AdmissionGate, Block, ChainSnapshot, ChainState, ErrorKind,
    MedianTimePastTracker, SequenceLock, Transaction, UtxoMaturity,
};
pub use mining::Mempool;
pub use storage::{Scenario, UtxoSet};
