//! # kr8 Build Engine
//!
//! This library resolves a tree of layered parameter files into per-cluster,
//! per-component output files, and regenerates only what changed. It backs
//! the `kr8` command-line tool but can be embedded with a custom evaluator.
//!
//! ## Quick Example
//!
//! ```
//! use kr8::config::parse_includes;
//! use kr8::merge::merge_values;
//! use serde_json::json;
//!
//! // Later layers win, objects merge recursively
//! let mut params = json!({"web": {"replicas": 1, "image": "nginx"}});
//! merge_values(&mut params, &json!({"web": {"replicas": 3}}));
//! assert_eq!(params["web"], json!({"replicas": 3, "image": "nginx"}));
//!
//! // All include encodings normalize the same way
//! let bare = parse_includes(&json!("deploy.yml")).unwrap();
//! let record = parse_includes(&json!([{"file": "deploy.yml"}])).unwrap();
//! assert_eq!(bare, record);
//! assert_eq!(bare[0].output_path("web").to_str(), Some("web/deploy.yaml"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Clusters**: a directory holding `cluster.jsonnet`. Every
//!   `params.jsonnet` between the cluster tree root and that directory is a
//!   layer of the cluster's params (`phases::discovery`, `phases::hierarchy`).
//! - **Evaluation (`evaluator`)**: the engine describes merges as
//!   `MergeExpression`s and hands them to a pluggable `Evaluator`.
//! - **Components (`config`)**: a cluster's `_components` names the
//!   components it deploys; each component's `kr8_spec` lists its includes.
//! - **Deployment cache (`cache`)**: a per-cluster record of what every
//!   component was generated from, used to skip unchanged work.
//! - **Staging (`filesystem`)**: rendered output is collected in memory and
//!   committed atomically.
//!
//! ## Execution Flow
//!
//! `phases::Engine::generate` runs the pipeline:
//!
//! 1.  **Discovery**: find clusters and apply the cluster filters.
//! 2.  **Cluster evaluation**: merge the ancestor chain, read `_kr8_spec`
//!     and `_components`, compare the cluster fingerprint with the cache.
//! 3.  **Components**: evaluate params, hash inputs, skip on a cache hit,
//!     otherwise render, write and reconcile.
//! 4.  **Cleanup**: remove orphaned component directories.
//! 5.  **Cache commit**: persist the new cache if nothing failed.

pub mod cache;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod filesystem;
pub mod filter;
pub mod memo;
pub mod merge;
pub mod output;
pub mod phases;
pub mod settings;

#[cfg(test)]
mod config_proptest;
