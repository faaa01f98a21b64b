//! Storage module: unspent outputs and scenario files

pub mod persistence;
pub mod utxo_set;

pub use persistence::{load_scenario, save_scenario, Scenario, ScenarioBlock, StorageError};
pub use utxo_set::{UtxoEntry, UtxoProvider, UtxoSet};
