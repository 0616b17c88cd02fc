//! The phases of a kr8 `generate` run.
//!
//! ## Overview
//!
//! A run follows these phases:
//! 1. Discovery - Find every `cluster.jsonnet` below the cluster directory
//! 2. Hierarchy - Order each cluster's `params.jsonnet` overrides root-most first
//! 3. Rendering - Turn each include of a component into output bytes
//! 4. Writing - Commit staged output atomically, skipping unchanged files
//! 5. Reconciling - Remove stale files and orphaned component directories
//!
//! The `orchestrator` drives them per cluster and per component, deciding
//! through the deployment cache which components need to run at all.
//!
//! Each phase depends only on earlier phases and the foundation modules
//! (`config`, `evaluator`, `cache`, `filesystem`).

pub mod discovery;
pub mod hierarchy;
pub mod orchestrator;
pub mod reconcile;
pub mod render;
pub mod write;

pub use discovery::{discover_clusters, find_cluster, Cluster};
pub use hierarchy::ancestor_chain;
pub use orchestrator::{
    ClusterReport, ComponentOutcome, ComponentReport, Engine, RunReport,
};
pub use reconcile::{prune_orphan_components, reconcile};
pub use render::{format_output, render_include, render_template, RenderContext};
pub use write::WriteStats;
