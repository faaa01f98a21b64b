//! Finality CLI Application
//!
//! A command-line interface for inspecting sequence numbers, median time
//! past and lock-time verdicts.

use chain_finality::cli;
use chain_finality::config::ConsensusParams;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "finality")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Lock-time and sequence-lock validation tool", long_about = None)]
struct Cli {
    /// Consensus parameters file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relative lock-time sequence numbers
    Sequence {
        #[command(subcommand)]
        action: SequenceCommands,
    },

    /// Median time past of block timestamps (oldest first)
    MedianTime {
        /// Block timestamps as Unix seconds
        #[arg(required = true, allow_negative_numbers = true)]
        timestamps: Vec<i64>,
    },

    /// Replay a scenario file and check its candidate transaction
    Check {
        /// Scenario file path
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

#[derive(Subcommand)]
enum SequenceCommands {
    /// Encode a relative lock
    Encode {
        /// Lock length in blocks
        #[arg(long, conflicts_with = "seconds")]
        blocks: Option<i64>,

        /// Lock length in seconds (rounded down to 512 second units)
        #[arg(long)]
        seconds: Option<i64>,
    },

    /// Decode a sequence number (decimal or 0x hex)
    Decode { value: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let params = match &cli.config {
        Some(path) => ConsensusParams::load(path)?,
        None => ConsensusParams::default(),
    };

    match cli.command {
        Commands::Sequence { action } => match action {
            SequenceCommands::Encode { blocks, seconds } => {
                cli::cmd_sequence_encode(blocks, seconds)?;
            }
            SequenceCommands::Decode { value } => {
                cli::cmd_sequence_decode(&value)?;
            }
        },

        Commands::MedianTime { timestamps } => {
            cli::cmd_median_time(&timestamps, &params)?;
        }

        Commands::Check { scenario } => {
            cli::cmd_check(&scenario, &params)?;
        }
    }

    Ok(())
}
