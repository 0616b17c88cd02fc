//! # Error Handling
//!
//! This module defines the centralized error type for the `kr8` build engine.
//! It uses `thiserror` to derive a single `Error` enum covering every failure
//! mode of discovery, evaluation, caching, rendering and reconciliation.
//!
//! ## Layers
//!
//! Lower layers return the plain variants (`Spec`, `Evaluation`, `Io`, ...).
//! The scheduler wraps them in `Cluster` or `Component` so the log line and
//! the run summary always name where a failure happened:
//!
//! ```text
//! cluster 'prod-eu': component 'ingress': Spec error: kr8_spec is missing
//! ```
//!
//! The `Result` alias is used everywhere in the library; the binary converts
//! into `anyhow::Error` at the command boundary.

use thiserror::Error;

/// Main error type for kr8 operations
#[derive(Error, Debug)]
pub enum Error {
    /// A path of the cluster tree could not be read.
    ///
    /// Raised only for filesystem problems during discovery; malformed file
    /// contents are reported later by evaluation.
    #[error("Discovery error at {path}: {message}")]
    Discovery { path: String, message: String },

    /// A cluster or component document lacks a required section or has a
    /// section of the wrong shape.
    #[error("Spec error: {message}{}", .hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Spec {
        message: String,
        /// Optional hint for how to fix the document
        hint: Option<String>,
    },

    /// The expression evaluator rejected or failed on a merge expression.
    #[error("Evaluation error in `{expression}`: {message}")]
    Evaluation { expression: String, message: String },

    /// A named extension function failed or does not exist.
    #[error("Extension function '{function}' failed: {message}")]
    Extension { function: String, message: String },

    /// An include could not be turned into an output file.
    #[error("Render error for include '{file}': {message}")]
    Render { file: String, message: String },

    /// Reading or writing the deployment cache failed.
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Writing or deleting generated output failed.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// A cluster/component filter could not be parsed.
    #[error("Filter error: {message}")]
    Filter { message: String },

    /// A failure that aborted a whole cluster.
    #[error("cluster '{cluster}': {source}")]
    Cluster {
        cluster: String,
        #[source]
        source: Box<Error>,
    },

    /// A failure that aborted one component of a cluster.
    #[error("cluster '{cluster}': component '{component}': {source}")]
    Component {
        cluster: String,
        component: String,
        #[source]
        source: Box<Error>,
    },

    /// A worker pool could not be started.
    #[error("Scheduler error: {message}")]
    Scheduler { message: String },

    /// A mutex guarding shared run state has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Shorthand for a `Spec` error without a hint.
    pub fn spec(message: impl Into<String>) -> Self {
        Error::Spec {
            message: message.into(),
            hint: None,
        }
    }

    /// Attach cluster context.
    pub fn in_cluster(self, cluster: &str) -> Self {
        Error::Cluster {
            cluster: cluster.to_string(),
            source: Box::new(self),
        }
    }

    /// Attach cluster and component context.
    pub fn in_component(self, cluster: &str, component: &str) -> Self {
        Error::Component {
            cluster: cluster.to_string(),
            component: component.to_string(),
            source: Box::new(self),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
