//! # kr8 CLI
//!
//! This is the binary entry point for the `kr8` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Initialising logging from `--log-level` or `RUST_LOG`.
//! - Executing the selected command and turning failures into a non-zero
//!   exit status.
//!
//! The build engine itself lives in the `kr8` library crate; the binary is a
//! thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
