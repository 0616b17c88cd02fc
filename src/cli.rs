//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use kr8::output::OutputConfig;
use kr8::settings::EngineSettings;

use crate::commands;

/// kr8 - Generate per-cluster configuration from a hierarchy of params
#[derive(Parser, Debug)]
#[command(name = "kr8")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Project root; component paths are relative to it
    #[arg(long, global = true, value_name = "DIR", env = "KR8_BASE", default_value = ".")]
    pub base: PathBuf,

    /// Root of the cluster tree (defaults to <base>/clusters)
    #[arg(long, global = true, value_name = "DIR", env = "KR8_CLUSTER_DIR")]
    pub cluster_dir: Option<PathBuf>,

    /// Extra import search path; repeat or separate with commas
    #[arg(
        short = 'J',
        long = "jpath",
        global = true,
        value_name = "DIR",
        env = "KR8_JPATH",
        value_delimiter = ','
    )]
    pub jpaths: Vec<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG applies when unset
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl GlobalArgs {
    /// Engine settings with everything but the command-specific options
    pub fn engine_settings(&self) -> EngineSettings {
        let mut settings = EngineSettings::new(&self.base);
        settings.cluster_dir = self.cluster_dir.as_ref().map(|dir| settings.resolve(dir));
        settings.jpaths = self.jpaths.clone();
        settings
    }

    pub fn output_config(&self) -> OutputConfig {
        OutputConfig::from_env_and_flag(&self.color)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate output for every selected cluster and component
    Generate(commands::generate::GenerateArgs),

    /// List the clusters of the cluster tree
    Clusters(commands::clusters::ClustersArgs),

    /// Print the evaluated params of a cluster or one of its components
    Params(commands::params::ParamsArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(self.global.log_level.as_deref());

        match self.command {
            Commands::Generate(args) => commands::generate::execute(args, &self.global),
            Commands::Clusters(args) => commands::clusters::execute(args, &self.global),
            Commands::Params(args) => commands::params::execute(args, &self.global),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Initialise `env_logger`. An explicit level wins over `RUST_LOG`; without
/// either only warnings and errors are shown.
fn init_logging(level: Option<&str>) {
    let mut builder = match level {
        Some(level) => {
            let mut builder = env_logger::Builder::new();
            builder.parse_filters(level);
            builder
        }
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")),
    };
    // A second initialisation (tests) is harmless
    let _ = builder.format_timestamp(None).try_init();
}
