//! # Clusters Command Implementation
//!
//! Lists every cluster found below the cluster directory with the path of
//! its definition file. This is a read-only operation; nothing is evaluated.

use anyhow::Result;
use clap::Args;
use std::path::Path;

use kr8::phases::discover_clusters;

use crate::cli::GlobalArgs;

/// List the clusters of the cluster tree
#[derive(Args, Debug, Default)]
pub struct ClustersArgs {
    /// Print only the cluster names
    #[arg(short, long)]
    pub names_only: bool,
}

/// Execute the clusters command
pub fn execute(args: ClustersArgs, global: &GlobalArgs) -> Result<()> {
    let settings = global.engine_settings();
    let clusters = discover_clusters(&settings.cluster_dir())?;

    if clusters.is_empty() {
        eprintln!("No clusters found in {}", settings.cluster_dir().display());
        return Ok(());
    }

    for line in format_listing(&clusters, &settings.base_dir, args.names_only) {
        println!("{}", line);
    }
    Ok(())
}

/// One line per cluster; paths are shown relative to the project root.
fn format_listing(clusters: &[kr8::phases::Cluster], base: &Path, names_only: bool) -> Vec<String> {
    let width = clusters.iter().map(|c| c.name.len()).max().unwrap_or(0);
    clusters
        .iter()
        .map(|cluster| {
            if names_only {
                cluster.name.clone()
            } else {
                let path = cluster.path.strip_prefix(base).unwrap_or(&cluster.path);
                format!("{:width$}  {}", cluster.name, path.display(), width = width)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_listing() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        for rel in ["clusters/dev/cluster.jsonnet", "clusters/eu/prod-eu/cluster.jsonnet"] {
            let path = base.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "{}").unwrap();
        }
        let clusters = discover_clusters(&base.join("clusters")).unwrap();

        let lines = format_listing(&clusters, base, false);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("dev      "));
        assert!(lines[1].ends_with("cluster.jsonnet"));
        assert!(lines[1].contains("prod-eu"));

        assert_eq!(format_listing(&clusters, base, true), vec!["dev", "prod-eu"]);
    }
}
