//! Scenario persistence
//!
//! A scenario is a genesis time, a list of blocks to connect on top of it
//! and a candidate transaction to check against the resulting tip. Stored
//! as JSON; timestamps are Unix seconds.

use crate::core::transaction::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// A block to connect while replaying a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioBlock {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub genesis_time: DateTime<Utc>,
    #[serde(default)]
    pub blocks: Vec<ScenarioBlock>,
    pub candidate: Transaction,
}

impl Scenario {
    /// Fill in ids left empty in the file
    pub fn ensure_ids(&mut self) {
        for block in &mut self.blocks {
            for tx in &mut block.transactions {
                tx.ensure_id();
            }
        }
        self.candidate.ensure_id();
    }

    /// Block timestamps must increase for the replay to make sense
    fn validate(&self) -> Result<(), StorageError> {
        let mut previous = self.genesis_time;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.timestamp <= previous {
                return Err(StorageError::InvalidData(format!(
                    "block {} timestamp does not increase",
                    i + 1
                )));
            }
            previous = block.timestamp;
        }
        Ok(())
    }
}

/// Load a scenario from a JSON file
pub fn load_scenario(path: &Path) -> Result<Scenario, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut scenario: Scenario = serde_json::from_reader(reader)?;
    scenario.validate()?;
    scenario.ensure_ids();
    Ok(scenario)
}

/// Save a scenario to a JSON file
pub fn save_scenario(scenario: &Scenario, path: &Path) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, scenario)?;
    Ok(())
}
