//! Cluster and component selection
//!
//! The CLI passes comma-separated lists straight through:
//!
//! - `--clusters prod-eu,staging-.*` - names, each an exact name or an
//!   anchored regex
//! - `--components ingress,monitoring-.*` - same rules, for components
//! - `--clincludes _cluster.tier=prod,_cluster.region~^eu-` - every
//!   condition must hold
//! - `--clexcludes _cluster.deprecated=true` - no condition may hold
//!
//! `select_clusters` is a pure function over already-evaluated cluster
//! documents; it performs no I/O and does not log.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::merge::json::scalar_to_string;
use crate::merge::lookup;

/// A condition on a cluster's evaluated params
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamCondition {
    /// `key=value`: the value at `key` renders to exactly `value`
    Equals { key: String, value: String },
    /// `key~regex`: the value at `key` matches `regex`
    Matches { key: String, pattern: String },
}

impl ParamCondition {
    /// Parse `key=value` or `key~regex`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let split = input.find(['=', '~']).ok_or_else(|| Error::Filter {
            message: format!("'{}' is not a key=value or key~regex condition", input),
        })?;
        let (key, rest) = input.split_at(split);
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(Error::Filter {
                message: format!("condition '{}' has an empty key", input),
            });
        }
        let value = rest[1..].trim().to_string();
        Ok(if rest.starts_with('=') {
            ParamCondition::Equals { key, value }
        } else {
            ParamCondition::Matches {
                key,
                pattern: value,
            }
        })
    }

    /// Parse a comma-separated list of conditions.
    pub fn parse_list(input: &str) -> Result<Vec<Self>> {
        split_list(input).map(Self::parse).collect()
    }

    fn holds(&self, config: &JsonValue) -> Result<bool> {
        Ok(match self {
            ParamCondition::Equals { key, value } => lookup(config, key)
                .map(scalar_to_string)
                .is_some_and(|actual| &actual == value),
            ParamCondition::Matches { key, pattern } => {
                let regex = Regex::new(pattern)?;
                lookup(config, key)
                    .map(scalar_to_string)
                    .is_some_and(|actual| regex.is_match(&actual))
            }
        })
    }
}

/// Everything the CLI can narrow a run down with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Cluster names or anchored regexes; empty means all
    pub clusters: Vec<String>,
    /// Component names or anchored regexes; empty means all
    pub components: Vec<String>,
    /// Conditions every selected cluster satisfies
    pub cluster_includes: Vec<ParamCondition>,
    /// Conditions no selected cluster satisfies
    pub cluster_excludes: Vec<ParamCondition>,
}

impl FilterSpec {
    /// Whether selection needs evaluated cluster params
    pub fn needs_params(&self) -> bool {
        !self.cluster_includes.is_empty() || !self.cluster_excludes.is_empty()
    }

    /// Whether components are narrowed down
    pub fn filters_components(&self) -> bool {
        !self.components.is_empty()
    }

    /// Whether `name` passes the component list
    pub fn selects_component(&self, name: &str) -> Result<bool> {
        matches_any(&self.components, name)
    }

    /// Compile every pattern once so bad input fails before any work starts.
    pub fn validate(&self) -> Result<()> {
        for pattern in self.clusters.iter().chain(&self.components) {
            anchored(pattern)?;
        }
        for condition in self.cluster_includes.iter().chain(&self.cluster_excludes) {
            if let ParamCondition::Matches { pattern, .. } = condition {
                Regex::new(pattern)?;
            }
        }
        Ok(())
    }
}

/// Split a comma-separated CLI list, dropping empty items.
pub fn split_list(input: &str) -> impl Iterator<Item = &str> {
    input.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn anchored(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}

fn matches_any(patterns: &[String], name: &str) -> Result<bool> {
    if patterns.is_empty() {
        return Ok(true);
    }
    for pattern in patterns {
        if pattern == name || anchored(pattern)?.is_match(name) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Select cluster names from `{name -> evaluated params}`.
///
/// Params are only consulted by include/exclude conditions; callers that do
/// not use conditions may pass `null` documents. The result is sorted.
pub fn select_clusters(
    all_cluster_configs: &BTreeMap<String, JsonValue>,
    filter: &FilterSpec,
) -> Result<Vec<String>> {
    let mut selected = Vec::new();
    for (name, config) in all_cluster_configs {
        if !matches_any(&filter.clusters, name)? {
            continue;
        }
        let mut included = true;
        for condition in &filter.cluster_includes {
            if !condition.holds(config)? {
                included = false;
                break;
            }
        }
        if !included {
            continue;
        }
        let mut excluded = false;
        for condition in &filter.cluster_excludes {
            if condition.holds(config)? {
                excluded = true;
                break;
            }
        }
        if !excluded {
            selected.push(name.clone());
        }
    }
    Ok(selected)
}
