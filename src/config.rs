//! Consensus parameters
//!
//! Loaded from a JSON file; any field left out falls back to its default.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

use crate::core::median_time::MTP_BLOCK_COUNT;

/// Maximum allowed time drift into the future (2 hours in seconds)
pub const MAX_FUTURE_BLOCK_TIME: i64 = 7200;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    /// Number of recent blocks in the median time past window
    pub median_time_span: usize,
    /// First block height at which BIP68 sequence locks are enforced
    pub csv_activation_height: i64,
    /// How far past wall-clock time a block timestamp may be, in seconds
    pub max_future_block_time: i64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            median_time_span: MTP_BLOCK_COUNT,
            csv_activation_height: 0,
            max_future_block_time: MAX_FUTURE_BLOCK_TIME,
        }
    }
}

impl ConsensusParams {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let params = serde_json::from_reader(reader)?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let params = ConsensusParams::default();
        assert_eq!(params.median_time_span, 11);
        assert_eq!(params.csv_activation_height, 0);
        assert_eq!(params.max_future_block_time, 7200);
    }

    #[test]
    fn test_load_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.json");
        let mut file = File::create(&path).unwrap();
        write!(file, r#"{{"csv_activation_height": 432}}"#).unwrap();

        let params = ConsensusParams::load(&path).unwrap();
        assert_eq!(params.csv_activation_height, 432);
        assert_eq!(params.median_time_span, MTP_BLOCK_COUNT);
    }

    #[test]
    fn test_load_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ConsensusParams::load(&path),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ConsensusParams::load(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
