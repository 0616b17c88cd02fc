//! Include rendering
//!
//! Turns one include directive into output bytes. The source file's
//! extension picks the adapter:
//!
//! | Source | Adapter |
//! |---|---|
//! | `.yaml`, `.yml`, `.json` | parsed as a (multi-document) YAML stream and re-emitted |
//! | `.tpl`, `.tmpl` | `{{ kr8.key }}` / `{{ kr8_cluster.key }}` placeholders substituted |
//! | anything else | evaluated through the `Evaluator` with the component bindings |
//!
//! Evaluated and parsed results are then formatted for the destination
//! extension by `format_output`.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::config::{ComponentSpec, IncludeDirective};
use crate::error::{Error, Result};
use crate::evaluator::{parse_documents, EvalContext, Evaluator, MergeExpression};
use crate::merge::{lookup, scalar_to_string};

/// Binding holding the component config (or an include's override)
pub const KR8_BINDING: &str = "kr8";
/// Binding holding the cluster's `_cluster` section
pub const CLUSTER_BINDING: &str = "kr8_cluster";
/// Binding holding every component's params of the cluster
pub const ALLPARAMS_BINDING: &str = "kr8_allparams";
/// Binding holding every cluster's `_cluster` section
pub const ALLCLUSTERS_BINDING: &str = "kr8_allclusters";

const PLACEHOLDER_PATTERN: &str = r"\{\{\s*(kr8|kr8_cluster)\.([A-Za-z0-9_\-\.\[\]]+)\s*\}\}";

/// Everything an include of one component is rendered against
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Directory of the component's sources
    pub component_dir: PathBuf,
    /// Evaluated component params
    pub config: JsonValue,
    /// The cluster's `_cluster` section
    pub cluster: JsonValue,
    /// Bindings shared by every include (`kr8` is added per include)
    pub bindings: EvalContext,
}

impl RenderContext {
    /// Build the shared bindings of a component.
    ///
    /// `extfiles` are read here, relative to the component directory. The
    /// fleet-wide values are only bound when passed in, which the caller does
    /// when the component spec asks for them.
    pub fn new(
        component_dir: &Path,
        spec: &ComponentSpec,
        config: JsonValue,
        cluster: JsonValue,
        global_jpaths: &[PathBuf],
        all_params: Option<&str>,
        all_clusters: Option<&str>,
    ) -> Result<Self> {
        let mut bindings = EvalContext::new()
            .with_code(CLUSTER_BINDING, serde_json::to_string(&cluster)?)
            .with_search_path(component_dir);
        for jpath in &spec.search_paths {
            bindings = bindings.with_search_path(component_dir.join(jpath));
        }
        for jpath in global_jpaths {
            bindings = bindings.with_search_path(jpath.clone());
        }
        if let Some(all_params) = all_params {
            bindings = bindings.with_code(ALLPARAMS_BINDING, all_params);
        }
        if let Some(all_clusters) = all_clusters {
            bindings = bindings.with_code(ALLCLUSTERS_BINDING, all_clusters);
        }
        for (name, file) in &spec.ext_files {
            let path = component_dir.join(file);
            let content = fs::read_to_string(&path).map_err(|e| Error::Render {
                file: path.display().to_string(),
                message: format!("cannot read extfile '{}': {}", name, e),
            })?;
            bindings = bindings.with_string(name.clone(), content);
        }

        Ok(Self {
            component_dir: component_dir.to_path_buf(),
            config,
            cluster,
            bindings,
        })
    }
}

/// Render one include to the bytes of its output file.
pub fn render_include(
    include: &IncludeDirective,
    ctx: &RenderContext,
    evaluator: &dyn Evaluator,
) -> Result<Vec<u8>> {
    let source = ctx.component_dir.join(&include.source_file);
    let config = include.config_override.as_ref().unwrap_or(&ctx.config);
    let render_error = |message: String| Error::Render {
        file: include.source_file.clone(),
        message,
    };

    match source_kind(&source) {
        SourceKind::Data => {
            let text = read_source(&source).map_err(render_error)?;
            let mut docs = parse_documents(&text).map_err(|e| render_error(e.to_string()))?;
            let value = match docs.len() {
                0 => JsonValue::Null,
                1 => docs.remove(0),
                _ => JsonValue::Array(docs),
            };
            format_output(&value, &include.dest_ext)
        }
        SourceKind::Template => {
            let text = read_source(&source).map_err(render_error)?;
            let rendered =
                render_template(&text, config, &ctx.cluster).map_err(|e| render_error(e.to_string()))?;
            Ok(rendered.into_bytes())
        }
        SourceKind::Expression => {
            let bindings = ctx
                .bindings
                .clone()
                .with_code(KR8_BINDING, serde_json::to_string(config)?);
            let expr = MergeExpression::new().import(&source);
            let text = evaluator.evaluate(&expr, &bindings)?;
            let value: JsonValue = serde_json::from_str(&text)?;
            format_output(&value, &include.dest_ext)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Data,
    Template,
    Expression,
}

fn source_kind(path: &Path) -> SourceKind {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "yaml" | "yml" | "json" => SourceKind::Data,
        "tpl" | "tmpl" => SourceKind::Template,
        _ => SourceKind::Expression,
    }
}

fn read_source(path: &Path) -> std::result::Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

/// Substitute `{{ kr8.key }}` and `{{ kr8_cluster.key }}` placeholders.
///
/// Keys are dotted paths. A placeholder naming a missing key is an error
/// rather than an empty string.
pub fn render_template(text: &str, config: &JsonValue, cluster: &JsonValue) -> Result<String> {
    let placeholder = Regex::new(PLACEHOLDER_PATTERN)?;
    let mut rendered = String::with_capacity(text.len());
    let mut last = 0;
    for caps in placeholder.captures_iter(text) {
        let (Some(whole), Some(root), Some(key)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let source = if root.as_str() == KR8_BINDING {
            config
        } else {
            cluster
        };
        let value = lookup(source, key.as_str()).ok_or_else(|| Error::Render {
            file: whole.as_str().to_string(),
            message: format!("'{}' has no key '{}'", root.as_str(), key.as_str()),
        })?;
        rendered.push_str(&text[last..whole.start()]);
        rendered.push_str(&scalar_to_string(value));
        last = whole.end();
    }
    rendered.push_str(&text[last..]);
    Ok(rendered)
}

/// Serialize a rendered value for a destination extension.
///
/// Strings are written as-is. `yaml`/`yml` emit YAML, with a top-level array
/// becoming one document per element. Everything else is pretty JSON.
pub fn format_output(value: &JsonValue, dest_ext: &str) -> Result<Vec<u8>> {
    if let JsonValue::String(raw) = value {
        return Ok(raw.clone().into_bytes());
    }
    match dest_ext.to_ascii_lowercase().as_str() {
        "yaml" | "yml" => match value {
            JsonValue::Array(docs) => {
                let mut out = String::new();
                for doc in docs {
                    out.push_str("---\n");
                    out.push_str(&serde_yaml::to_string(doc)?);
                }
                Ok(out.into_bytes())
            }
            other => Ok(serde_yaml::to_string(other)?.into_bytes()),
        },
        _ => {
            let mut out = serde_json::to_string_pretty(value)?;
            out.push('\n');
            Ok(out.into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_includes;
    use crate::evaluator::LayeredEvaluator;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn component(files: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp
    }

    fn context(dir: &Path, spec: &ComponentSpec, config: JsonValue) -> RenderContext {
        RenderContext::new(
            dir,
            spec,
            config,
            json!({"cluster_name": "dev", "region": "eu"}),
            &[],
            None,
            None,
        )
        .unwrap()
    }

    fn include(value: JsonValue) -> IncludeDirective {
        parse_includes(&value).unwrap().remove(0)
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_string_is_raw() {
            let out = format_output(&json!("plain text\n"), "yaml").unwrap();
            assert_eq!(out, b"plain text\n");
        }

        #[test]
        fn test_yaml_object() {
            let out = format_output(&json!({"a": 1}), "yaml").unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), "a: 1\n");
        }

        #[test]
        fn test_yaml_array_is_multi_document() {
            let out = format_output(&json!([{"a": 1}, {"b": 2}]), "yml").unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), "---\na: 1\n---\nb: 2\n");
        }

        #[test]
        fn test_json_is_pretty() {
            let out = format_output(&json!({"a": 1}), "json").unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"a\": 1\n}\n");
        }

        #[test]
        fn test_unknown_extension_is_json() {
            let out = format_output(&json!([1]), "conf").unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), "[\n  1\n]\n");
        }
    }

    mod template_tests {
        use super::*;

        #[test]
        fn test_substitutes_config_and_cluster() {
            let out = render_template(
                "name={{ kr8.name }} replicas={{kr8.scale.replicas}} region={{ kr8_cluster.region }}",
                &json!({"name": "web", "scale": {"replicas": 3}}),
                &json!({"region": "eu"}),
            )
            .unwrap();
            assert_eq!(out, "name=web replicas=3 region=eu");
        }

        #[test]
        fn test_missing_key_is_error() {
            let err = render_template("{{ kr8.nope }}", &json!({}), &json!({})).unwrap_err();
            assert!(matches!(err, Error::Render { .. }));
        }

        #[test]
        fn test_text_without_placeholders_is_unchanged() {
            let text = "{{ other }} and { kr8.x }";
            assert_eq!(render_template(text, &json!({}), &json!({})).unwrap(), text);
        }
    }

    mod include_tests {
        use super::*;

        #[test]
        fn test_yaml_source_re_emitted() {
            let dir = component(&[("deploy.yml", "kind: Deployment\nspec:\n  replicas: 2\n")]);
            let ctx = context(dir.path(), &ComponentSpec::default(), json!({}));
            let out = render_include(&include(json!("deploy.yml")), &ctx, &LayeredEvaluator::new()).unwrap();
            let value: JsonValue = serde_yaml::from_slice(&out).unwrap();
            assert_eq!(value["spec"]["replicas"], json!(2));
        }

        #[test]
        fn test_json_source_to_json_dest() {
            let dir = component(&[("cm.json", r#"{"b":1,"a":2}"#)]);
            let ctx = context(dir.path(), &ComponentSpec::default(), json!({}));
            let out = render_include(
                &include(json!({"file": "cm.json", "dest_ext": "json"})),
                &ctx,
                &LayeredEvaluator::new(),
            )
            .unwrap();
            assert!(String::from_utf8(out).unwrap().starts_with("{\n"));
        }

        #[test]
        fn test_template_uses_config_override() {
            let dir = component(&[("motd.tpl", "hello {{ kr8.who }} in {{ kr8_cluster.cluster_name }}\n")]);
            let ctx = context(dir.path(), &ComponentSpec::default(), json!({"who": "component"}));
            let evaluator = LayeredEvaluator::new();

            let out = render_include(&include(json!("motd.tpl")), &ctx, &evaluator).unwrap();
            assert_eq!(out, b"hello component in dev\n");

            let out = render_include(
                &include(json!({"file": "motd.tpl", "config": {"who": "override"}})),
                &ctx,
                &evaluator,
            )
            .unwrap();
            assert_eq!(out, b"hello override in dev\n");
        }

        #[test]
        fn test_expression_source_sees_bindings() {
            let dir = component(&[
                (
                    "deploy.jsonnet",
                    r#"{"replicas": {"$var": "kr8", "path": "replicas"},
                        "cluster": {"$var": "kr8_cluster", "path": "cluster_name"},
                        "banner": {"$var": "banner"}}"#,
                ),
                ("banner.txt", "hi"),
            ]);
            let spec = ComponentSpec {
                ext_files: BTreeMap::from([("banner".to_string(), "banner.txt".to_string())]),
                ..Default::default()
            };
            let ctx = context(dir.path(), &spec, json!({"replicas": 4}));
            let out = render_include(
                &include(json!({"file": "deploy.jsonnet", "dest_ext": "json"})),
                &ctx,
                &LayeredEvaluator::new(),
            )
            .unwrap();
            let value: JsonValue = serde_json::from_slice(&out).unwrap();
            assert_eq!(value, json!({"replicas": 4, "cluster": "dev", "banner": "hi"}));
        }

        #[test]
        fn test_missing_source_is_render_error() {
            let dir = component(&[]);
            let ctx = context(dir.path(), &ComponentSpec::default(), json!({}));
            let err = render_include(&include(json!("absent.yml")), &ctx, &LayeredEvaluator::new())
                .unwrap_err();
            assert!(matches!(err, Error::Render { .. }));
        }

        #[test]
        fn test_missing_extfile_fails_context() {
            let dir = component(&[]);
            let spec = ComponentSpec {
                ext_files: BTreeMap::from([("x".to_string(), "nope.txt".to_string())]),
                ..Default::default()
            };
            let result = RenderContext::new(dir.path(), &spec, json!({}), json!({}), &[], None, None);
            assert!(result.is_err());
        }
    }
}
