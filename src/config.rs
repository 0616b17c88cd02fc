//! # Component Catalog
//!
//! This module defines the typed view of the evaluated cluster and component
//! documents and the logic extracting it. Evaluators return loosely shaped
//! JSON; everything downstream works on the structs defined here.
//!
//! ## Cluster document
//!
//! ```yaml
//! _kr8_spec:
//!   generate_dir: generated     # required
//!   prune_params: false
//! _cluster:
//!   cluster_name: prod-eu       # injected by the engine
//!   tier: prod
//! _components:
//!   ingress: { path: components/ingress }
//! ingress:                      # cluster-level params for the component
//!   replicas: 3
//! ```
//!
//! ## Component params
//!
//! Every component's evaluated params carry a `kr8_spec` object. Its
//! `includes` field accepts three encodings, all normalized into
//! `IncludeDirective` at parse time:
//!
//! ```yaml
//! includes: deployment.yml                  # a bare string
//! includes: { file: crds.yml, dest_dir: shared }   # a single record
//! includes:                                 # a mix of both
//!   - deployment.yml
//!   - { file: service.jsonnet, dest_ext: json }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::settings::DEFAULT_DEST_EXT;

/// Key of the cluster build settings
pub const KR8_SPEC_KEY: &str = "_kr8_spec";
/// Key of the cluster metadata
pub const CLUSTER_KEY: &str = "_cluster";
/// Key of the component map
pub const COMPONENTS_KEY: &str = "_components";
/// Key of a component's build settings inside its params
pub const COMPONENT_SPEC_KEY: &str = "kr8_spec";

/// Cluster-level build settings (`_kr8_spec`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    /// Root of the generated tree; the cluster writes to `<generate_dir>/<name>`
    pub generate_dir: PathBuf,
    /// Prune nulls and empty containers from component params
    pub prune_params: bool,
}

#[derive(Deserialize)]
struct RawClusterSpec {
    generate_dir: Option<String>,
    #[serde(default)]
    prune_params: bool,
}

/// Extract `_kr8_spec` from an evaluated cluster document.
pub fn extract_cluster_spec(doc: &JsonValue) -> Result<ClusterSpec> {
    let section = doc.get(KR8_SPEC_KEY).ok_or_else(|| Error::Spec {
        message: format!("{} is missing from the cluster params", KR8_SPEC_KEY),
        hint: Some("Define _kr8_spec in the root params.jsonnet".to_string()),
    })?;
    let raw = RawClusterSpec::deserialize(section).map_err(|e| Error::Spec {
        message: format!("{} is malformed: {}", KR8_SPEC_KEY, e),
        hint: None,
    })?;
    let generate_dir = raw
        .generate_dir
        .filter(|dir| !dir.trim().is_empty())
        .ok_or_else(|| Error::Spec {
            message: format!("{}.generate_dir is missing", KR8_SPEC_KEY),
            hint: Some("Set generate_dir in the root params.jsonnet".to_string()),
        })?;
    Ok(ClusterSpec {
        generate_dir: PathBuf::from(generate_dir),
        prune_params: raw.prune_params,
    })
}

/// A component declared by a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub name: String,
    /// Component directory, relative to the project base directory
    pub path: PathBuf,
}

#[derive(Deserialize)]
struct RawComponentRef {
    path: String,
}

/// Extract the `_components` map. A cluster without the section declares no
/// components.
pub fn extract_components(doc: &JsonValue) -> Result<BTreeMap<String, ComponentRef>> {
    let section = match doc.get(COMPONENTS_KEY) {
        None | Some(JsonValue::Null) => return Ok(BTreeMap::new()),
        Some(section) => section,
    };
    let map = section.as_object().ok_or_else(|| Error::Spec {
        message: format!("{} must be an object of name -> {{path}}", COMPONENTS_KEY),
        hint: None,
    })?;

    let mut components = BTreeMap::new();
    for (name, entry) in map {
        let raw = RawComponentRef::deserialize(entry).map_err(|e| Error::Spec {
            message: format!("{}.{} is malformed: {}", COMPONENTS_KEY, name, e),
            hint: Some(format!("Declare it as {}: {{ path: 'components/{}' }}", name, name)),
        })?;
        components.insert(
            name.clone(),
            ComponentRef {
                name: name.clone(),
                path: PathBuf::from(raw.path),
            },
        );
    }
    Ok(components)
}

/// Component build settings (`kr8_spec`)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ComponentSpec {
    /// Bind the merged params of every component as `kr8_allparams`
    #[serde(rename = "enable_kr8_allparams", default)]
    pub include_all_cluster_params: bool,
    /// Bind the `_cluster` section of every cluster as `kr8_allclusters`
    #[serde(rename = "enable_kr8_allclusters", default)]
    pub include_all_clusters: bool,
    /// Leave stale files in the component directory alone
    #[serde(default)]
    pub disable_output_clean: bool,
    /// Always regenerate this component
    #[serde(default)]
    pub disable_cache: bool,
    /// Files bound as raw string variables, relative to the component dir
    #[serde(rename = "extfiles", default)]
    pub ext_files: BTreeMap<String, String>,
    /// Extra import search dirs, relative to the component dir
    #[serde(rename = "jpaths", default)]
    pub search_paths: Vec<String>,
    /// Output files to materialize
    #[serde(default, deserialize_with = "deserialize_includes")]
    pub includes: Vec<IncludeDirective>,
}

/// Extract `kr8_spec` from a component's evaluated params.
pub fn extract_spec(component_config: &JsonValue) -> Result<ComponentSpec> {
    let section = component_config
        .get(COMPONENT_SPEC_KEY)
        .ok_or_else(|| Error::Spec {
            message: format!("{} is missing from the component params", COMPONENT_SPEC_KEY),
            hint: Some("Declare at least `kr8_spec: {}` in the component params.jsonnet".to_string()),
        })?;
    if section.is_null() {
        return Ok(ComponentSpec::default());
    }
    ComponentSpec::deserialize(section).map_err(|e| Error::Spec {
        message: format!("{} is malformed: {}", COMPONENT_SPEC_KEY, e),
        hint: None,
    })
}

/// One output file to materialize from one source file
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeDirective {
    /// Source path, relative to the component directory
    pub source_file: String,
    /// Output directory relative to the cluster output dir; the component
    /// directory when unset
    pub dest_dir: Option<String>,
    /// Output file name without extension
    pub dest_name: String,
    /// Output file extension, without the dot
    pub dest_ext: String,
    /// Replaces the component config while rendering this include
    pub config_override: Option<JsonValue>,
}

impl IncludeDirective {
    /// Directive for a bare file name, all defaults applied
    pub fn from_file(file: &str) -> Self {
        Self::from_record(IncludeRecord {
            file: file.to_string(),
            ..Default::default()
        })
    }

    fn from_record(record: IncludeRecord) -> Self {
        let dest_name = record
            .dest_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_dest_name(&record.file));
        let dest_ext = record
            .dest_ext
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| DEFAULT_DEST_EXT.to_string());
        Self {
            source_file: record.file,
            dest_dir: record.dest_dir.filter(|dir| !dir.is_empty()),
            dest_name,
            dest_ext,
            config_override: record.config,
        }
    }

    /// Output directory relative to the cluster output dir
    pub fn output_dir(&self, component: &str) -> PathBuf {
        PathBuf::from(self.dest_dir.as_deref().unwrap_or(component))
    }

    /// Output file name (`<dest_name>.<dest_ext>`)
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.dest_name, self.dest_ext)
    }

    /// Output path relative to the cluster output dir
    pub fn output_path(&self, component: &str) -> PathBuf {
        self.output_dir(component).join(self.output_file_name())
    }
}

fn default_dest_name(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string())
}

/// Full record form of an include
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct IncludeRecord {
    file: String,
    #[serde(default)]
    dest_dir: Option<String>,
    #[serde(default)]
    dest_name: Option<String>,
    #[serde(default)]
    dest_ext: Option<String>,
    #[serde(default)]
    config: Option<JsonValue>,
}

/// `includes` may be null, one entry or an array of entries. Each entry is a
/// bare file name or a record; anything else is rejected.
fn deserialize_includes<'de, D>(deserializer: D) -> std::result::Result<Vec<IncludeDirective>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    match value {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Array(entries)) => entries
            .into_iter()
            .map(include_entry)
            .collect::<std::result::Result<_, _>>()
            .map_err(serde::de::Error::custom),
        Some(entry) => include_entry(entry)
            .map(|include| vec![include])
            .map_err(serde::de::Error::custom),
    }
}

fn include_entry(entry: JsonValue) -> std::result::Result<IncludeDirective, String> {
    match entry {
        JsonValue::String(file) => Ok(IncludeDirective::from_file(&file)),
        JsonValue::Object(_) => IncludeRecord::deserialize(entry)
            .map(IncludeDirective::from_record)
            .map_err(|e| format!("invalid include record: {}", e)),
        other => Err(format!(
            "includes must be a file name, a {{file: ...}} record, or a list of those (got {})",
            other
        )),
    }
}

/// Parse a standalone `includes` value (used by tests and tooling).
pub fn parse_includes(value: &JsonValue) -> Result<Vec<IncludeDirective>> {
    deserialize_includes(value).map_err(|e| Error::spec(e.to_string()))
}
