//! Hierarchy Resolver: ancestor chains
//!
//! A cluster's params are the merge of every `params.jsonnet` between the
//! cluster tree root and the cluster directory, followed by the cluster
//! definition itself. Evaluators merge left to right with later layers
//! winning, so the chain is ordered root-most first:
//!
//! ```text
//! clusters/params.jsonnet
//! clusters/eu/params.jsonnet
//! clusters/eu/prod-eu/params.jsonnet
//! clusters/eu/prod-eu/cluster.jsonnet
//! ```
//!
//! Directories without an override file are simply skipped.

use std::path::{Path, PathBuf};

use crate::settings::PARAMS_FILE;

/// Ordered parameter files for the cluster defined at `cluster_def_path`.
///
/// Walks from the definition's directory up to `base_dir` (inclusive),
/// collecting override files, then reverses so the root-most file is first.
/// The definition file is always the last entry. If the definition does not
/// live under `base_dir`, the walk continues to the filesystem root.
pub fn ancestor_chain(base_dir: &Path, cluster_def_path: &Path) -> Vec<PathBuf> {
    let mut chain = vec![cluster_def_path.to_path_buf()];

    let mut dir = cluster_def_path.parent();
    while let Some(current) = dir {
        if current.as_os_str().is_empty() {
            break;
        }
        let params = current.join(PARAMS_FILE);
        if params.is_file() {
            chain.push(params);
        }
        if current == base_dir {
            break;
        }
        dir = current.parent();
    }

    chain.reverse();
    chain
}
