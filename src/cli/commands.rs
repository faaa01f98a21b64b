//! CLI commands for the finality tool
//!
//! Implements the command handlers for the CLI interface.

use crate::config::ConsensusParams;
use crate::core::{
    decode, lock_time_to_sequence, ChainError, ChainState, MedianTimePastTracker, RelativeLock,
    Transaction, SEQUENCE_FINAL,
};
use crate::mining::{Mempool, MempoolError};
use crate::storage::{load_scenario, Scenario};
use chrono::{TimeZone, Utc};
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Encode a relative lock given in blocks or seconds
pub fn cmd_sequence_encode(blocks: Option<i64>, seconds: Option<i64>) -> CliResult<()> {
    let sequence = match (blocks, seconds) {
        (Some(n), None) => lock_time_to_sequence(false, n)?,
        (None, Some(s)) => lock_time_to_sequence(true, s)?,
        _ => return Err("pass exactly one of --blocks or --seconds".into()),
    };

    println!("Sequence: {} (0x{:08x})", sequence, sequence);
    print_relative_lock(sequence);
    Ok(())
}

/// Decode a sequence number given in decimal or 0x-prefixed hex
pub fn cmd_sequence_decode(value: &str) -> CliResult<()> {
    let sequence = parse_sequence(value)?;
    let decoded = decode(sequence);

    println!("Sequence: {} (0x{:08x})", sequence, sequence);
    println!("   ├─ Disabled: {}", decoded.disabled);
    println!("   ├─ Time based: {}", decoded.is_time_based);
    println!("   ├─ Value: {}", decoded.value);
    if sequence == SEQUENCE_FINAL {
        println!("   ├─ Final: lock time disabled when all inputs are final");
    }
    print_relative_lock(sequence);
    Ok(())
}

fn print_relative_lock(sequence: u32) {
    match RelativeLock::from_sequence(sequence) {
        RelativeLock::Disabled => println!("   └─ No relative lock"),
        RelativeLock::Blocks(n) => println!("   └─ Spendable {} blocks after confirmation", n),
        lock @ RelativeLock::Seconds(_) => println!(
            "   └─ Spendable {} seconds after confirmation",
            lock.seconds().unwrap_or(0)
        ),
    }
}

pub fn parse_sequence(value: &str) -> Result<u32, std::num::ParseIntError> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

/// Median time past of the given block timestamps, oldest first
pub fn cmd_median_time(timestamps: &[i64], params: &ConsensusParams) -> CliResult<()> {
    let mut tracker = MedianTimePastTracker::with_span(params.median_time_span);
    for ts in timestamps {
        tracker.push_block(*ts);
    }

    let median = tracker.median()?;
    println!("Median time past: {}", median);
    if let Some(time) = Utc.timestamp_opt(median, 0).single() {
        println!("   └─ {}", time.to_rfc3339());
    }
    Ok(())
}

// =============================================================================
// Scenario check
// =============================================================================

/// Verdicts for a scenario's candidate transaction
#[derive(Debug)]
pub struct CheckReport {
    pub height: u64,
    pub median_time_past: i64,
    /// Acceptance into the mempool on top of the tip
    pub mempool: Result<(), MempoolError>,
    /// Connection of the next block containing the candidate
    pub block: Result<(), ChainError>,
}

/// Replay the scenario's blocks and check its candidate
pub fn check_scenario(scenario: &Scenario, params: &ConsensusParams) -> CliResult<CheckReport> {
    let mut chain = ChainState::new(params.clone(), scenario.genesis_time);
    for block in &scenario.blocks {
        chain.extend(block.timestamp, block.transactions.clone())?;
    }

    let median_time_past = chain.median_time_past()?;
    let mempool = Mempool::new().add_transaction(scenario.candidate.clone(), &chain);
    let block = candidate_block(&mut chain.clone(), &scenario.candidate, median_time_past);

    Ok(CheckReport {
        height: chain.height(),
        median_time_past,
        mempool,
        block,
    })
}

fn candidate_block(
    chain: &mut ChainState,
    candidate: &Transaction,
    median_time_past: i64,
) -> Result<(), ChainError> {
    let timestamp = Utc
        .timestamp_opt(median_time_past + 1, 0)
        .single()
        .unwrap_or_else(Utc::now);
    chain.extend(timestamp, vec![candidate.clone()]).map(|_| ())
}

pub fn cmd_check(path: &Path, params: &ConsensusParams) -> CliResult<()> {
    let scenario = load_scenario(path)?;
    let report = check_scenario(&scenario, params)?;

    println!("Candidate: {}", scenario.candidate.id);
    println!(
        "   ├─ Tip: height {}, median time past {}",
        report.height, report.median_time_past
    );
    match &report.mempool {
        Ok(()) => println!("   ├─ Mempool: accepted"),
        Err(e) => println!("   ├─ Mempool: rejected ({})", e),
    }
    match &report.block {
        Ok(()) => println!("   └─ Block {}: valid", report.height + 1),
        Err(e) => println!("   └─ Block {}: invalid ({})", report.height + 1, e),
    }
    Ok(())
}
