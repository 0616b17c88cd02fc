//! JSON document helpers shared by the evaluator, the catalog and filters
//!
//! Layered parameters are plain JSON values once they have been loaded. This
//! module holds the operations the engine performs on them:
//!
//! - `json::merge_values` - recursive "later layer wins" object merge
//! - `json::prune` - drop nulls and empty containers after a merge
//! - `json::lookup` - read a value at a dotted key such as `_cluster.region`
//!
//! Dotted keys are parsed with `parse_path`, which filter conditions
//! (`--clincludes _cluster.tier=prod`) and template placeholders
//! (`{{ kr8.image.tag }}`) both go through.

pub mod json;

pub use json::{lookup, merge_values, prune, scalar_to_string};

/// Represents a segment in a path expression for navigating nested structures
///
/// Dotted keys like `_cluster.region` or `replicas[0].name` are parsed into a
/// sequence of segments before walking a JSON document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key for accessing object/map members
    Key(String),
    /// A numeric index for accessing array/sequence elements
    Index(usize),
}

/// Parse a dotted key into segments
///
/// `a.b` walks object keys, `a[0]` indexes arrays, `a["x.y"]` quotes a key
/// holding dots and `a\.b` escapes a single dot. Empty keys are dropped.
///
/// # Examples
///
/// ```
/// use kr8::merge::parse_path;
///
/// let segments = parse_path("_cluster.nodes[0].zone");
/// assert_eq!(segments.len(), 4);
/// ```
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut key = String::new();
    let mut chars = path.trim().chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => key.extend(chars.next()),
            '.' => push_key(&mut key, &mut segments),
            '[' => {
                push_key(&mut key, &mut segments);
                let inner: String = chars.by_ref().take_while(|c| *c != ']').collect();
                let inner = inner.trim();
                match inner.parse::<usize>() {
                    Ok(idx) => segments.push(PathSegment::Index(idx)),
                    Err(_) if !inner.is_empty() => segments.push(PathSegment::Key(
                        inner.trim_matches(|c: char| c == '"' || c == '\'').to_string(),
                    )),
                    Err(_) => {}
                }
            }
            _ => key.push(ch),
        }
    }
    push_key(&mut key, &mut segments);
    segments
}

fn push_key(key: &mut String, segments: &mut Vec<PathSegment>) {
    if !key.is_empty() {
        segments.push(PathSegment::Key(std::mem::take(key)));
    }
}
