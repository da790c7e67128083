//! Dotted paths into JSON documents.
//!
//! Providers nest the same information at different depths (`error.message`,
//! `errors.0.message`, `paging.cursors.after`). A [`FieldPath`] is the
//! declarative way to name such a location; lookups return `None` instead of
//! failing when any segment is missing or has the wrong shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A dotted path such as `entry.0.changes.0.field`.
///
/// Numeric segments index into arrays; every other segment is an object key.
/// The empty path refers to the document root.
///
/// # Examples
///
/// ```rust
/// use hookbridge_sdk::FieldPath;
/// use serde_json::json;
///
/// let body = json!({"errors": [{"code": 214, "message": "Webhook URL does not meet the requirements."}]});
///
/// let code = FieldPath::new("errors.0.code");
/// assert_eq!(code.lookup_string(&body).as_deref(), Some("214"));
///
/// let missing = FieldPath::new("error.error.status");
/// assert!(missing.lookup(&body).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Empty segments are ignored.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = raw
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Self { raw, segments }
    }

    /// The path that addresses the document itself.
    pub fn root() -> Self {
        Self::new("")
    }

    /// Prefix this path with another, e.g. `tracks` + `items` = `tracks.items`.
    pub fn under(&self, prefix: &str) -> Self {
        if prefix.is_empty() {
            return self.clone();
        }
        if self.segments.is_empty() {
            return Self::new(prefix);
        }
        Self::new(format!("{}.{}", prefix, self.raw))
    }

    /// The path as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the path addresses the root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk the path. Returns `None` as soon as a segment is missing.
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index)),
                _ => None,
            })
    }

    /// Walk the path and render scalars as strings.
    ///
    /// Strings are returned as-is, numbers and booleans are stringified; null,
    /// arrays and objects yield `None`.
    pub fn lookup_string(&self, value: &Value) -> Option<String> {
        match self.lookup(value)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Walk the path and read an unsigned integer, accepting numeric strings.
    pub fn lookup_u64(&self, value: &Value) -> Option<u64> {
        match self.lookup(value)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for FieldPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for FieldPath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for FieldPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.raw
    }
}

#[cfg(test)]
#[path = "field_path_tests.rs"]
mod tests;
