//! # Generate Command Implementation
//!
//! Runs the build engine over the cluster tree and prints a per-cluster
//! summary:
//!
//! ```text
//! ✅ dev: 3 generated, 1 cached, 0 failed (4 files written)
//! ❌ prod-eu: cluster 'prod-eu': Spec error: _kr8_spec is missing
//! ```
//!
//! The command fails (non-zero exit) when a cluster failed, or when a
//! component failed and `--strict` is set.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Args;

use kr8::evaluator::LayeredEvaluator;
use kr8::filter::{split_list, FilterSpec, ParamCondition};
use kr8::output::{emoji, OutputConfig, Status};
use kr8::phases::{ComponentOutcome, Engine, RunReport};
use kr8::settings::EngineSettings;

use crate::cli::GlobalArgs;

/// Arguments for the generate command
#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// Clusters to generate: comma-separated names or regexes
    #[arg(long, value_name = "LIST")]
    pub clusters: Option<String>,

    /// Components to generate: comma-separated names or regexes
    #[arg(long, value_name = "LIST")]
    pub components: Option<String>,

    /// Only clusters whose params match all of these (key=value or key~regex)
    #[arg(long, value_name = "CONDITIONS")]
    pub clincludes: Option<String>,

    /// Skip clusters whose params match any of these (key=value or key~regex)
    #[arg(long, value_name = "CONDITIONS")]
    pub clexcludes: Option<String>,

    /// Number of clusters generated concurrently (defaults to the CPU count)
    #[arg(short, long, value_name = "N", env = "KR8_PARALLEL")]
    pub parallel: Option<usize>,

    /// Number of components generated concurrently per cluster
    #[arg(long, value_name = "N", env = "KR8_COMPONENT_PARALLEL")]
    pub component_parallel: Option<usize>,

    /// Write output here instead of each cluster's generate_dir
    #[arg(long, value_name = "DIR", env = "KR8_GENERATE_DIR")]
    pub generate_dir: Option<PathBuf>,

    /// Ignore the deployment cache and regenerate everything
    #[arg(long)]
    pub no_cache: bool,

    /// Write cache files gzip-compressed
    #[arg(long)]
    pub compress_cache: bool,

    /// Exit with an error when any component fails
    #[arg(long)]
    pub strict: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Translate command-line options into engine settings.
pub fn build_settings(args: &GenerateArgs, global: &GlobalArgs) -> Result<EngineSettings> {
    let mut settings = global.engine_settings();

    let mut filters = FilterSpec::default();
    if let Some(clusters) = &args.clusters {
        filters.clusters = split_list(clusters).map(str::to_string).collect();
    }
    if let Some(components) = &args.components {
        filters.components = split_list(components).map(str::to_string).collect();
    }
    if let Some(includes) = &args.clincludes {
        filters.cluster_includes = ParamCondition::parse_list(includes)?;
    }
    if let Some(excludes) = &args.clexcludes {
        filters.cluster_excludes = ParamCondition::parse_list(excludes)?;
    }
    filters.validate()?;
    settings.filters = filters;

    let clusters = args.parallel.unwrap_or(settings.cluster_parallelism);
    let components = args
        .component_parallel
        .unwrap_or(settings.component_parallelism);
    settings = settings.with_parallelism(clusters, components);

    settings.generate_dir = args.generate_dir.clone();
    settings.use_cache = !args.no_cache;
    settings.compress_cache = args.compress_cache;
    settings.fail_on_component_error = args.strict;
    Ok(settings)
}

/// Execute the generate command
pub fn execute(args: GenerateArgs, global: &GlobalArgs) -> Result<()> {
    let start_time = Instant::now();
    let settings = build_settings(&args, global)?;
    let strict = settings.fail_on_component_error;
    let engine = Engine::new(settings, Arc::new(LayeredEvaluator::new()));

    let report = engine.generate()?;

    if !args.quiet {
        print_summary(&report, &global.output_config());
        println!(
            "{} Done in {:.2}s: {} files written, {} cache hits",
            emoji(&global.output_config(), "⏱️ ", "[TIME]"),
            start_time.elapsed().as_secs_f64(),
            report.files_written(),
            report.cache_hits()
        );
    }

    exit_status(&report, strict)
}

/// Error when the run should exit non-zero
pub fn exit_status(report: &RunReport, strict: bool) -> Result<()> {
    let failed_clusters = report.clusters.iter().filter(|c| c.is_failed()).count();
    if failed_clusters > 0 {
        anyhow::bail!("{} cluster(s) failed", failed_clusters);
    }
    if strict && report.has_component_failures() {
        let failed: usize = report.clusters.iter().map(|c| c.failed_components()).sum();
        anyhow::bail!("{} component(s) failed", failed);
    }
    Ok(())
}

fn print_summary(report: &RunReport, output: &OutputConfig) {
    if report.clusters.is_empty() {
        println!("{} No clusters selected", emoji(output, "🔍", "[INFO]"));
        return;
    }

    for cluster in &report.clusters {
        if let Some(error) = &cluster.error {
            println!(
                "{} {}: {}",
                emoji(output, "❌", "[FAIL]"),
                output.paint(Status::Failed, &cluster.name),
                error
            );
            continue;
        }

        let (marker, status) = if cluster.failed_components() > 0 {
            (emoji(output, "⚠️ ", "[WARN]"), Status::Warning)
        } else {
            (emoji(output, "✅", "[OK]"), Status::Ok)
        };
        println!(
            "{} {}: {} generated, {} cached, {} failed ({} files written)",
            marker,
            output.paint(status, &cluster.name),
            cluster.generated(),
            cluster.cached(),
            cluster.failed_components(),
            cluster.files_written()
        );
        for component in &cluster.components {
            if let ComponentOutcome::Failed(message) = &component.outcome {
                println!("   {} {}", emoji(output, "↳", "-"), message);
            }
        }
        for orphan in &cluster.orphans_removed {
            println!(
                "   {} removed {}",
                emoji(output, "🧹", "-"),
                orphan.display()
            );
        }
    }
}
