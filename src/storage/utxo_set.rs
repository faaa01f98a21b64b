//! Unspent output set
//!
//! Tracks every spendable output together with the height and median time
//! past at which it confirmed, which is what relative lock-times are
//! measured from.

use crate::core::sequence_lock::UtxoMaturity;
use crate::core::transaction::{OutPoint, Transaction, TransactionOutput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Entry
// =============================================================================

/// A spendable output and where it was confirmed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub output: TransactionOutput,
    pub maturity: UtxoMaturity,
    pub is_coinbase: bool,
}

// =============================================================================
// Provider
// =============================================================================

/// Read access to unspent outputs at a fixed chain position
pub trait UtxoProvider {
    fn lookup(&self, outpoint: &OutPoint) -> Option<&UtxoEntry>;

    /// Maturity of every output spent by `tx`, in input order.
    ///
    /// `None` if any input is unknown, see [`UtxoProvider::first_missing`].
    fn maturities_for(&self, tx: &Transaction) -> Option<Vec<UtxoMaturity>> {
        tx.inputs
            .iter()
            .map(|input| self.lookup(&input.previous_output).map(|e| e.maturity))
            .collect()
    }

    /// The first input of `tx` whose output is not in the set
    fn first_missing<'a>(&self, tx: &'a Transaction) -> Option<&'a OutPoint> {
        tx.inputs
            .iter()
            .map(|input| &input.previous_output)
            .find(|outpoint| self.lookup(outpoint).is_none())
    }
}

// =============================================================================
// UTXO Set
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    entries: HashMap<OutPoint, UtxoEntry>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add all outputs of a transaction confirmed at `maturity`.
    ///
    /// Unspent entries are never replaced; check [`UtxoSet::first_unspent_output`]
    /// before connecting.
    pub fn add_outputs(&mut self, tx: &Transaction, maturity: UtxoMaturity) {
        let is_coinbase = tx.is_valid_coinbase();
        for (vout, output) in tx.outputs.iter().enumerate() {
            self.entries
                .entry(tx.outpoint(vout as u32))
                .or_insert_with(|| UtxoEntry {
                    output: output.clone(),
                    maturity,
                    is_coinbase,
                });
        }
    }

    /// First output of `tx` whose outpoint is still unspent
    pub fn first_unspent_output(&self, tx: &Transaction) -> Option<OutPoint> {
        (0..tx.outputs.len() as u32)
            .map(|vout| tx.outpoint(vout))
            .find(|outpoint| self.entries.contains_key(outpoint))
    }

    /// Remove the outputs spent by a transaction
    pub fn spend_inputs(&mut self, tx: &Transaction) {
        if tx.is_valid_coinbase() {
            return;
        }
        for input in &tx.inputs {
            self.entries.remove(&input.previous_output);
        }
    }

    pub fn spend(&mut self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        self.entries.remove(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total value held by an address
    pub fn balance(&self, recipient: &str) -> u64 {
        self.entries
            .values()
            .filter(|e| e.output.recipient == recipient)
            .map(|e| e.output.amount)
            .sum()
    }
}

impl UtxoProvider for UtxoSet {
    fn lookup(&self, outpoint: &OutPoint) -> Option<&UtxoEntry> {
        self.entries.get(outpoint)
    }
}
