//! JSON merge operations
//!
//! Layers of a hierarchy are combined left to right: objects are merged
//! key by key with recursive descent, anything else in the later layer
//! replaces what was there. This mirrors the `a + b` object composition the
//! merge expressions describe.
//!
//! ## Example
//!
//! ```
//! use kr8::merge::merge_values;
//! use serde_json::json;
//!
//! let mut base = json!({"app": {"replicas": 1, "image": "nginx"}});
//! merge_values(&mut base, &json!({"app": {"replicas": 3}}));
//! assert_eq!(base, json!({"app": {"replicas": 3, "image": "nginx"}}));
//! ```

use serde_json::Value as JsonValue;

use super::{parse_path, PathSegment};

/// Recursively merge `source` into `target`.
///
/// - Objects: keys are merged recursively, source keys win on conflict
/// - Arrays and scalars: the source value replaces the target value
/// - `null` in the source is a real value and replaces the target
pub fn merge_values(target: &mut JsonValue, source: &JsonValue) {
    match (target, source) {
        (JsonValue::Object(target_map), JsonValue::Object(source_map)) => {
            for (key, value) in source_map {
                let nested = value.is_object()
                    && target_map.get(key).is_some_and(|existing| existing.is_object());
                if nested {
                    if let Some(existing) = target_map.get_mut(key) {
                        merge_values(existing, value);
                    }
                } else {
                    target_map.insert(key.clone(), value.clone());
                }
            }
        }
        (target, source) => {
            *target = source.clone();
        }
    }
}

/// Remove nulls, empty objects and empty arrays, recursively.
///
/// Containers that become empty after their children are pruned are removed
/// as well. A top-level value that prunes away entirely becomes `null`.
pub fn prune(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            for child in map.values_mut() {
                prune(child);
            }
            map.retain(|_, child| !is_prunable(child));
        }
        JsonValue::Array(items) => {
            for child in items.iter_mut() {
                prune(child);
            }
            items.retain(|child| !is_prunable(child));
        }
        _ => {}
    }
}

fn is_prunable(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Object(map) => map.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Read the value at a dotted key (`_cluster.region`, `nodes[0].zone`).
///
/// Returns `None` when any segment is missing or indexes into the wrong
/// kind of value. An empty key returns the root.
pub fn lookup<'a>(value: &'a JsonValue, key: &str) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in parse_path(key) {
        current = match (&segment, current) {
            (PathSegment::Key(key), JsonValue::Object(map)) => map.get(key)?,
            (PathSegment::Index(idx), JsonValue::Array(items)) => items.get(*idx)?,
            // Numeric segments written with dots (`nodes.0`) still address arrays
            (PathSegment::Key(key), JsonValue::Array(items)) => {
                items.get(key.parse::<usize>().ok()?)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// String form of a scalar, as used by template substitution and filters.
///
/// Strings are returned without quotes; other values use compact JSON.
pub fn scalar_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
