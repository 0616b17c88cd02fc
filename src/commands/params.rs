//! # Params Command Implementation
//!
//! Prints the evaluated params of one cluster, or of one of its components,
//! as pretty JSON. Useful to check what an ancestor chain resolves to before
//! generating anything.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use kr8::evaluator::LayeredEvaluator;
use kr8::phases::Engine;

use crate::cli::GlobalArgs;

/// Print evaluated params
#[derive(Args, Debug)]
pub struct ParamsArgs {
    /// Cluster to evaluate
    #[arg(value_name = "CLUSTER")]
    pub cluster: String,

    /// Print the params of this component instead of the whole cluster
    #[arg(short = 'C', long, value_name = "NAME")]
    pub component: Option<String>,
}

/// Execute the params command
pub fn execute(args: ParamsArgs, global: &GlobalArgs) -> Result<()> {
    let engine = Engine::new(global.engine_settings(), Arc::new(LayeredEvaluator::new()));
    let params = engine.cluster_params(&args.cluster, args.component.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}
