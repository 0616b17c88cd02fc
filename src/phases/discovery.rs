//! Path Index: cluster discovery
//!
//! Walks the cluster tree and returns one `Cluster` per `cluster.jsonnet`.
//! Discovery only looks at file names. Whether a definition file parses is
//! decided later by evaluation, so a broken cluster fails on its own instead
//! of hiding every other cluster.
//!
//! ```text
//! clusters/
//!   params.jsonnet              <- override for every cluster
//!   eu/
//!     params.jsonnet            <- override for eu clusters
//!     prod-eu/cluster.jsonnet   <- cluster "prod-eu"
//!   dev/cluster.jsonnet         <- cluster "dev"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::settings::CLUSTER_FILE;

/// A cluster found in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Name of the directory holding the definition file
    pub name: String,
    /// Path of the definition file
    pub path: PathBuf,
    /// Directory holding the definition file
    pub dir: PathBuf,
}

impl Cluster {
    fn from_definition(path: &Path) -> Option<Self> {
        let dir = path.parent()?.to_path_buf();
        let name = dir.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            name,
            path: path.to_path_buf(),
            dir,
        })
    }
}

/// Find every cluster under `cluster_dir`, sorted by name.
///
/// Fails only when part of the tree cannot be read. Two definitions with the
/// same directory name are ambiguous; the first in path order wins and the
/// other is skipped with a warning.
pub fn discover_clusters(cluster_dir: &Path) -> Result<Vec<Cluster>> {
    if !cluster_dir.is_dir() {
        return Err(Error::Discovery {
            path: cluster_dir.display().to_string(),
            message: "cluster directory does not exist or is not a directory".to_string(),
        });
    }

    let mut clusters: BTreeMap<String, Cluster> = BTreeMap::new();
    for entry in WalkDir::new(cluster_dir)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::Discovery {
            path: e
                .path()
                .unwrap_or(cluster_dir)
                .display()
                .to_string(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() || entry.file_name() != CLUSTER_FILE {
            continue;
        }
        let Some(cluster) = Cluster::from_definition(entry.path()) else {
            continue;
        };
        if let Some(existing) = clusters.get(&cluster.name) {
            warn!(
                "Skipping {}: cluster '{}' is already defined by {}",
                cluster.path.display(),
                cluster.name,
                existing.path.display()
            );
            continue;
        }
        debug!("Found cluster {} at {}", cluster.name, cluster.path.display());
        clusters.insert(cluster.name.clone(), cluster);
    }

    Ok(clusters.into_values().collect())
}

/// Look a cluster up by name.
pub fn find_cluster<'a>(clusters: &'a [Cluster], name: &str) -> Result<&'a Cluster> {
    clusters
        .iter()
        .find(|cluster| cluster.name == name)
        .ok_or_else(|| Error::Discovery {
            path: name.to_string(),
            message: format!(
                "no such cluster; known clusters: {}",
                clusters
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}
