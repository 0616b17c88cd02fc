//! # Completions Command Implementation
//!
//! Prints a shell completion script for `kr8` to stdout. The script is
//! derived from the same clap definition the binary parses with.
//!
//! ```bash
//! kr8 completions bash > ~/.local/share/bash-completion/completions/kr8
//! kr8 completions zsh > ~/.zfunc/_kr8
//! ```

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::Shell;

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell (bash, zsh, fish, powershell, elvish)
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the `completions` command
pub fn execute(args: CompletionsArgs) -> Result<()> {
    write_completions(args.shell, &mut io::stdout());
    Ok(())
}

fn write_completions(shell: Shell, out: &mut dyn Write) {
    clap_complete::generate(shell, &mut Cli::command(), "kr8", out);
}
