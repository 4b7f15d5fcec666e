use common::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct JsonPathsDocument {
    jsonpaths: Vec<String>,
}

/// One step of a JSONPath expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Parses a JSONPaths document (`{"jsonpaths": ["$['artist']", ...]}`) into
/// one segment list per target column, in column order.
pub fn parse_jsonpaths(document: &[u8]) -> Result<Vec<Vec<PathSegment>>> {
    let doc: JsonPathsDocument = serde_json::from_slice(document)
        .map_err(|e| Error::Load(format!("invalid JSONPaths document: {}", e)))?;

    doc.jsonpaths.iter().map(|p| parse_path(p)).collect()
}

/// Supports the bracket (`$['a']["b"][0]`) and dot (`$.a.b`) notations.
fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let invalid = || Error::Load(format!("unsupported JSONPath expression '{}'", path));

    let mut rest = path.trim().strip_prefix('$').ok_or_else(invalid)?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            if end == 0 {
                return Err(invalid());
            }
            segments.push(PathSegment::Key(after[..end].to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(invalid)?;
            let inner = after[..close].trim();
            let segment = match inner.chars().next() {
                Some(q @ ('\'' | '"')) => {
                    let key = inner
                        .strip_prefix(q)
                        .and_then(|s| s.strip_suffix(q))
                        .ok_or_else(invalid)?;
                    PathSegment::Key(key.to_string())
                }
                _ => PathSegment::Index(inner.parse().map_err(|_| invalid())?),
            };
            segments.push(segment);
            rest = &after[close + 1..];
        } else {
            return Err(invalid());
        }
    }

    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments)
}

/// Follows a parsed path; missing members resolve to `None`.
pub fn resolve<'v>(value: &'v Value, path: &[PathSegment]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, segment| match segment {
        PathSegment::Key(key) => current.get(key.as_str()),
        PathSegment::Index(index) => current.get(*index),
    })
}
