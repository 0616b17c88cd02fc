//! # Expression Evaluation
//!
//! The build engine never merges parameter files itself. It describes the
//! merge it wants as a `MergeExpression` (an ordered list of operands joined
//! left to right, later operands winning) and hands it to an `Evaluator`
//! together with an `EvalContext` of external bindings. The evaluator returns
//! the fully resolved document as JSON text.
//!
//! ## Pluggable evaluators
//!
//! `Evaluator` is a trait so a full expression language can be plugged in.
//! Such an evaluator typically consumes the jsonnet-style rendering of the
//! expression (`expr.to_string()`) and the bindings as external variables.
//!
//! `LayeredEvaluator` is the built-in implementation. It understands layers
//! written as plain JSON or YAML, merges them recursively and expands
//! in-document extension calls:
//!
//! ```json
//! { "escaped": { "$call": "escapeStringRegex", "args": ["a.b"] } }
//! ```
//!
//! and references to bindings, optionally narrowed to a dotted path:
//!
//! ```json
//! { "replicas": { "$var": "kr8", "path": "replicas" } }
//! ```
//!
//! Extension functions live in an `Extensions` registry; converters (helm,
//! compose, ...) are registered by the embedding application.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::trace;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::merge::{lookup, merge_values, prune};

/// Key marking an in-document extension call
pub const CALL_KEY: &str = "$call";

/// Key marking an in-document binding reference
pub const VAR_KEY: &str = "$var";

/// One term of a merge expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Import a parameter file, optionally nested under a key
    Import { path: PathBuf, under: Option<String> },
    /// A code binding from the evaluation context
    Binding(String),
    /// A literal document
    Inline(JsonValue),
}

/// Left-to-right merge of operands with an optional prune pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeExpression {
    operands: Vec<Operand>,
    prune: bool,
}

impl MergeExpression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an import of `path`
    pub fn import(mut self, path: impl Into<PathBuf>) -> Self {
        self.operands.push(Operand::Import {
            path: path.into(),
            under: None,
        });
        self
    }

    /// Append an import of `path` nested under `key`
    pub fn import_under(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.operands.push(Operand::Import {
            path: path.into(),
            under: Some(key.into()),
        });
        self
    }

    /// Append a code binding reference
    pub fn binding(mut self, name: impl Into<String>) -> Self {
        self.operands.push(Operand::Binding(name.into()));
        self
    }

    /// Append a literal document
    pub fn inline(mut self, value: JsonValue) -> Self {
        self.operands.push(Operand::Inline(value));
        self
    }

    /// Request the prune post-pass
    pub fn pruned(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn is_pruned(&self) -> bool {
        self.prune
    }
}

impl fmt::Display for MergeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .operands
            .iter()
            .map(|operand| match operand {
                Operand::Import { path, under: None } => format!("import '{}'", path.display()),
                Operand::Import {
                    path,
                    under: Some(key),
                } => format!("{{ '{}': import '{}' }}", key, path.display()),
                Operand::Binding(name) => format!("std.extVar('{}')", name),
                Operand::Inline(value) => value.to_string(),
            })
            .collect();
        let body = if terms.is_empty() {
            "{}".to_string()
        } else {
            terms.join(" + ")
        };
        if self.prune {
            write!(f, "std.prune({})", body)
        } else {
            write!(f, "{}", body)
        }
    }
}

/// External bindings and library search paths for one evaluation
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    strings: BTreeMap<String, String>,
    code: BTreeMap<String, String>,
    search_paths: Vec<PathBuf>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a raw string variable
    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.strings.insert(name.into(), value.into());
        self
    }

    /// Bind a code variable (JSON text)
    pub fn with_code(mut self, name: impl Into<String>, json: impl Into<String>) -> Self {
        self.code.insert(name.into(), json.into());
        self
    }

    /// Add a directory searched by imports
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.strings.get(name).map(String::as_str)
    }

    pub fn code(&self, name: &str) -> Option<&str> {
        self.code.get(name).map(String::as_str)
    }

    pub fn strings(&self) -> &BTreeMap<String, String> {
        &self.strings
    }

    pub fn code_bindings(&self) -> &BTreeMap<String, String> {
        &self.code
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

/// Evaluates merge expressions into JSON text
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expr: &MergeExpression, ctx: &EvalContext) -> Result<String>;
}

/// Signature of an extension function
pub type ExtensionFn = Arc<dyn Fn(&[JsonValue]) -> Result<JsonValue> + Send + Sync>;

/// Registry of named functions callable from evaluated documents
#[derive(Clone, Default)]
pub struct Extensions {
    functions: BTreeMap<String, ExtensionFn>,
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Extensions {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The general-purpose helpers every project gets
    pub fn with_defaults() -> Self {
        let mut extensions = Self::new();
        extensions.register("parseYaml", |args| {
            let text = string_arg("parseYaml", args, 0)?;
            let docs = parse_documents(text).map_err(|e| Error::Extension {
                function: "parseYaml".to_string(),
                message: e.to_string(),
            })?;
            Ok(JsonValue::Array(docs))
        });
        extensions.register("parseJson", |args| {
            let text = string_arg("parseJson", args, 0)?;
            serde_json::from_str(text).map_err(|e| Error::Extension {
                function: "parseJson".to_string(),
                message: e.to_string(),
            })
        });
        extensions.register("escapeStringRegex", |args| {
            let text = string_arg("escapeStringRegex", args, 0)?;
            Ok(JsonValue::String(regex::escape(text)))
        });
        extensions.register("regexMatch", |args| {
            let pattern = compile_arg("regexMatch", args, 0)?;
            let text = string_arg("regexMatch", args, 1)?;
            Ok(JsonValue::Bool(pattern.is_match(text)))
        });
        extensions.register("regexSubst", |args| {
            let pattern = compile_arg("regexSubst", args, 0)?;
            let text = string_arg("regexSubst", args, 1)?;
            let replacement = string_arg("regexSubst", args, 2)?;
            Ok(JsonValue::String(
                pattern.replace_all(text, replacement).into_owned(),
            ))
        });
        extensions
    }

    /// Register (or replace) a function
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[JsonValue]) -> Result<JsonValue> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Invoke a function by name
    pub fn call(&self, name: &str, args: &[JsonValue]) -> Result<JsonValue> {
        let function = self.functions.get(name).ok_or_else(|| Error::Extension {
            function: name.to_string(),
            message: "no such function is registered".to_string(),
        })?;
        function(args)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

fn string_arg<'a>(function: &str, args: &'a [JsonValue], idx: usize) -> Result<&'a str> {
    args.get(idx)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::Extension {
            function: function.to_string(),
            message: format!("argument {} must be a string", idx + 1),
        })
}

fn compile_arg(function: &str, args: &[JsonValue], idx: usize) -> Result<regex::Regex> {
    let pattern = string_arg(function, args, idx)?;
    regex::Regex::new(pattern).map_err(|e| Error::Extension {
        function: function.to_string(),
        message: e.to_string(),
    })
}

/// Parse a YAML (or JSON) stream into its documents.
///
/// Empty documents are skipped, so a file holding only comments yields an
/// empty list.
pub fn parse_documents(text: &str) -> Result<Vec<JsonValue>> {
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = JsonValue::deserialize(document)?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

/// Built-in evaluator for JSON/YAML parameter layers
#[derive(Debug, Clone)]
pub struct LayeredEvaluator {
    extensions: Extensions,
}

impl Default for LayeredEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl LayeredEvaluator {
    /// Evaluator with the default extension set
    pub fn new() -> Self {
        Self::with_extensions(Extensions::with_defaults())
    }

    pub fn with_extensions(extensions: Extensions) -> Self {
        Self { extensions }
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn resolve_import(&self, path: &Path, ctx: &EvalContext) -> Option<PathBuf> {
        if path.is_absolute() || path.exists() {
            return path.exists().then(|| path.to_path_buf());
        }
        ctx.search_paths()
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
    }

    fn load_operand(&self, operand: &Operand, ctx: &EvalContext) -> std::result::Result<JsonValue, String> {
        match operand {
            Operand::Import { path, under } => {
                let resolved = self
                    .resolve_import(path, ctx)
                    .ok_or_else(|| format!("cannot find '{}'", path.display()))?;
                let text = fs::read_to_string(&resolved)
                    .map_err(|e| format!("cannot read '{}': {}", resolved.display(), e))?;
                let mut docs = parse_documents(&text)
                    .map_err(|e| format!("'{}' is not a JSON/YAML document: {}", resolved.display(), e))?;
                let value = match docs.len() {
                    0 => JsonValue::Object(Default::default()),
                    1 => docs.remove(0),
                    n => {
                        return Err(format!(
                            "'{}' holds {} documents, expected one",
                            resolved.display(),
                            n
                        ))
                    }
                };
                Ok(match under {
                    Some(key) => {
                        let mut wrapper = serde_json::Map::new();
                        wrapper.insert(key.clone(), value);
                        JsonValue::Object(wrapper)
                    }
                    None => value,
                })
            }
            Operand::Binding(name) => resolve_binding(name, ctx),
            Operand::Inline(value) => Ok(value.clone()),
        }
    }

    /// Replace every `{"$call": name, "args": [...]}` object by the result
    /// of the named extension and every `{"$var": name}` object by the
    /// binding's value. Arguments are expanded first.
    fn expand_calls(&self, value: JsonValue, ctx: &EvalContext) -> Result<JsonValue> {
        match value {
            JsonValue::Object(map) => {
                if let Some(JsonValue::String(name)) = map.get(VAR_KEY) {
                    let bound = resolve_binding(name, ctx).map_err(|message| Error::Evaluation {
                        expression: format!("std.extVar('{}')", name),
                        message,
                    })?;
                    return match map.get("path").and_then(JsonValue::as_str) {
                        Some(path) => lookup(&bound, path).cloned().ok_or_else(|| Error::Evaluation {
                            expression: format!("std.extVar('{}').{}", name, path),
                            message: "no such field".to_string(),
                        }),
                        None => Ok(bound),
                    };
                }
                if let Some(JsonValue::String(function)) = map.get(CALL_KEY) {
                    let function = function.clone();
                    let args = match map.get("args") {
                        Some(JsonValue::Array(args)) => args.clone(),
                        Some(other) => vec![other.clone()],
                        None => Vec::new(),
                    };
                    let args = args
                        .into_iter()
                        .map(|arg| self.expand_calls(arg, ctx))
                        .collect::<Result<Vec<_>>>()?;
                    trace!("calling extension {} with {} args", function, args.len());
                    return self.extensions.call(&function, &args);
                }
                let mut expanded = serde_json::Map::new();
                for (key, child) in map {
                    expanded.insert(key, self.expand_calls(child, ctx)?);
                }
                Ok(JsonValue::Object(expanded))
            }
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| self.expand_calls(item, ctx))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            other => Ok(other),
        }
    }
}

fn resolve_binding(name: &str, ctx: &EvalContext) -> std::result::Result<JsonValue, String> {
    match (ctx.code(name), ctx.string(name)) {
        (Some(code), _) => serde_json::from_str(code)
            .map_err(|e| format!("binding '{}' is not valid JSON: {}", name, e)),
        (None, Some(text)) => Ok(JsonValue::String(text.to_string())),
        (None, None) => Err(format!("undefined external variable '{}'", name)),
    }
}

impl Evaluator for LayeredEvaluator {
    fn evaluate(&self, expr: &MergeExpression, ctx: &EvalContext) -> Result<String> {
        let evaluation_error = |message: String| Error::Evaluation {
            expression: expr.to_string(),
            message,
        };

        let mut document = JsonValue::Object(Default::default());
        for operand in expr.operands() {
            let layer = self.load_operand(operand, ctx).map_err(evaluation_error)?;
            let layer = self.expand_calls(layer, ctx)?;
            merge_values(&mut document, &layer);
        }
        if expr.is_pruned() {
            prune(&mut document);
        }
        Ok(serde_json::to_string(&document)?)
    }
}
