//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `kr8`
//! command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` (and the global
//!   options) and performs the command's logic by calling into the `kr8`
//!   library.

pub mod clusters;
pub mod completions;
pub mod generate;
pub mod params;
