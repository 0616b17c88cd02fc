//! Engine settings
//!
//! Everything that used to be process-wide state of a generate run (base
//! directory, parallelism, filters, cache behaviour) lives in one
//! `EngineSettings` value. The CLI builds it once from flags and environment
//! variables and the engine passes it down by reference; core logic never
//! reads the environment itself.

use std::path::{Path, PathBuf};
use std::thread;

use crate::filter::FilterSpec;

/// Name of the cluster definition file
pub const CLUSTER_FILE: &str = "cluster.jsonnet";

/// Name of per-directory and per-component parameter files
pub const PARAMS_FILE: &str = "params.jsonnet";

/// Name of the per-cluster cache file inside the cluster output directory
pub const CACHE_FILE: &str = ".kr8_cache";

/// Extension used when an include does not set `dest_ext`
pub const DEFAULT_DEST_EXT: &str = "yaml";

/// Settings for one engine instance
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Project root; component paths are relative to it
    pub base_dir: PathBuf,
    /// Root of the cluster tree; defaults to `<base_dir>/clusters`
    pub cluster_dir: Option<PathBuf>,
    /// Overrides every cluster's `_kr8_spec.generate_dir`
    pub generate_dir: Option<PathBuf>,
    /// Number of clusters generated concurrently
    pub cluster_parallelism: usize,
    /// Number of components generated concurrently within one cluster
    pub component_parallelism: usize,
    /// Extra import search paths for every evaluation
    pub jpaths: Vec<PathBuf>,
    /// Cluster/component selection
    pub filters: FilterSpec,
    /// Write cache files gzip-compressed
    pub compress_cache: bool,
    /// Consult and update the deployment cache
    pub use_cache: bool,
    /// Treat component failures like cluster failures for the exit code
    pub fail_on_component_error: bool,
}

impl EngineSettings {
    /// Settings with defaults for a project rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let parallelism = default_parallelism();
        Self {
            base_dir: base_dir.into(),
            cluster_dir: None,
            generate_dir: None,
            cluster_parallelism: parallelism,
            component_parallelism: parallelism,
            jpaths: Vec::new(),
            filters: FilterSpec::default(),
            compress_cache: false,
            use_cache: true,
            fail_on_component_error: false,
        }
    }

    /// Directory scanned for cluster definitions
    pub fn cluster_dir(&self) -> PathBuf {
        self.cluster_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("clusters"))
    }

    /// Resolve a project-relative path against the base directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Set both pool sizes (builder style, mostly for tests)
    pub fn with_parallelism(mut self, clusters: usize, components: usize) -> Self {
        self.cluster_parallelism = clusters.max(1);
        self.component_parallelism = components.max(1);
        self
    }
}

/// Number of available CPUs, at least one
pub fn default_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
