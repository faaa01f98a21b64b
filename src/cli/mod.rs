//! Command-line interface handlers

pub mod commands;

pub use commands::{
    check_scenario, cmd_check, cmd_median_time, cmd_sequence_decode, cmd_sequence_encode,
    CheckReport, CliResult,
};
