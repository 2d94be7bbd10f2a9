//! Command line interface for the `helperchain` demo binary.
//!
//! The binary drives a short chain of waiting helpers and prints the order
//! in which their methods ran.

use clap::Parser;

/// Command line arguments for the `helperchain` binary.
#[derive(Debug, Parser)]
#[command(name = "helperchain", version, about = "Run a chain of test helpers and print their order")]
pub struct Cli {
    /// Number of waiting `step` helpers to chain.
    #[arg(short, long, default_value_t = 3)]
    pub steps: u64,

    /// Follow every step with a callback that invokes a nested helper.
    #[arg(short, long)]
    pub nested: bool,

    /// Make the given step fail, halting the rest of the chain.
    #[arg(short, long, value_name = "STEP")]
    pub fail_at: Option<u64>,
}
