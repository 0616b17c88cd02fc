//! Output Reconciler
//!
//! Keeps output directories consistent with what was declared:
//!
//! - inside a component directory, generated files that no include produced
//!   anymore are deleted (`reconcile`)
//! - inside a cluster directory, subdirectories belonging to no declared
//!   component are deleted (`prune_orphan_components`)
//!
//! Only files with a generated extension are candidates for the first, and
//! only directories for the second, so hand-placed files (and the cluster's
//! cache file) survive both.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{Error, Result};

/// Delete files in `component_output_dir` that carry one of `extensions`
/// and are not in `managed_names`. Returns the deleted paths, sorted.
///
/// Subdirectories and files with other extensions are never touched. A
/// missing directory has nothing to reconcile.
pub fn reconcile(
    component_output_dir: &Path,
    managed_names: &BTreeSet<String>,
    extensions: &BTreeSet<String>,
) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(component_output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::Filesystem {
                message: format!(
                    "Failed to list '{}': {}",
                    component_output_dir.display(),
                    e
                ),
            })
        }
    };

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let generated = path
            .extension()
            .is_some_and(|ext| extensions.contains(&*ext.to_string_lossy()));
        if !generated || managed_names.contains(&name) {
            continue;
        }
        fs::remove_file(&path).map_err(|e| Error::Filesystem {
            message: format!("Failed to remove stale '{}': {}", path.display(), e),
        })?;
        debug!("Removed stale output {}", path.display());
        removed.push(path);
    }

    removed.sort();
    Ok(removed)
}

/// Delete subdirectories of `cluster_output_dir` whose name is not in `keep`.
///
/// Best effort: failures are logged and the remaining directories are still
/// visited. Returns the directories actually removed, sorted.
pub fn prune_orphan_components(cluster_output_dir: &Path, keep: &BTreeSet<String>) -> Vec<PathBuf> {
    let entries = match fs::read_dir(cluster_output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(
                "Cannot list {} for orphan cleanup: {}",
                cluster_output_dir.display(),
                e
            );
            return Vec::new();
        }
    };

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_dir || keep.contains(&name) {
            continue;
        }
        let path = entry.path();
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!("Removed orphaned component output {}", path.display());
                removed.push(path);
            }
            Err(e) => warn!("Failed to remove orphan {}: {}", path.display(), e),
        }
    }

    removed.sort();
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    mod reconcile_tests {
        use super::*;

        #[test]
        fn test_removes_unmanaged_generated_files() {
            let temp = TempDir::new().unwrap();
            let dir = temp.path().join("web");
            touch(&dir.join("deploy.yaml"));
            touch(&dir.join("old.yaml"));

            let removed = reconcile(&dir, &set(&["deploy.yaml"]), &set(&["yaml"])).unwrap();
            assert_eq!(removed, vec![dir.join("old.yaml")]);
            assert!(dir.join("deploy.yaml").exists());
            assert!(!dir.join("old.yaml").exists());
        }

        #[test]
        fn test_leaves_foreign_extensions_and_subdirs() {
            let temp = TempDir::new().unwrap();
            let dir = temp.path().join("web");
            touch(&dir.join("README.md"));
            touch(&dir.join("notes.txt"));
            touch(&dir.join("nested/old.yaml"));

            let removed = reconcile(&dir, &set(&[]), &set(&["yaml"])).unwrap();
            assert!(removed.is_empty());
            assert!(dir.join("README.md").exists());
            assert!(dir.join("nested/old.yaml").exists());
        }

        #[test]
        fn test_custom_extensions_are_reconciled() {
            let temp = TempDir::new().unwrap();
            let dir = temp.path().join("web");
            touch(&dir.join("a.json"));
            touch(&dir.join("b.yaml"));

            let removed = reconcile(&dir, &set(&[]), &set(&["yaml", "json"])).unwrap();
            assert_eq!(removed.len(), 2);
        }

        #[test]
        fn test_missing_dir_is_ok() {
            let temp = TempDir::new().unwrap();
            let removed = reconcile(&temp.path().join("none"), &set(&[]), &set(&["yaml"])).unwrap();
            assert!(removed.is_empty());
        }
    }

    mod orphan_tests {
        use super::*;

        #[test]
        fn test_prunes_undeclared_component_dirs() {
            let temp = TempDir::new().unwrap();
            let cluster = temp.path();
            touch(&cluster.join("web/deploy.yaml"));
            touch(&cluster.join("retired/deploy.yaml"));
            touch(&cluster.join(".kr8_cache"));

            let removed = prune_orphan_components(cluster, &set(&["web"]));
            assert_eq!(removed, vec![cluster.join("retired")]);
            assert!(cluster.join("web/deploy.yaml").exists());
            assert!(cluster.join(".kr8_cache").exists());
        }

        #[test]
        fn test_keeps_dest_dir_targets() {
            let temp = TempDir::new().unwrap();
            touch(&temp.path().join("shared/crds.yaml"));
            assert!(prune_orphan_components(temp.path(), &set(&["web", "shared"])).is_empty());
        }

        #[test]
        fn test_missing_cluster_dir() {
            let temp = TempDir::new().unwrap();
            assert!(prune_orphan_components(&temp.path().join("none"), &set(&[])).is_empty());
        }
    }
}
