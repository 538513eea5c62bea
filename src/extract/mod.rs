//! Numeric field extraction from fetched documents.
//!
//! A missing key, a missing leaf or a non-numeric leaf is an expected
//! condition (partial upstream responses) and yields `None`, never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Structured document returned by one fetch. Consumed within a single poll cycle.
pub type RawResponse = Value;

/// Nested key path to a numeric leaf, e.g. `query.statistics.articles`.
///
/// A segment that parses as an integer also indexes into arrays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Builds a path from its segments.
    ///
    /// Returns `None` if there are no segments or any segment is empty.
    pub fn new<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(Self { segments })
    }

    /// Parses a dot-separated path.
    pub fn parse(path: &str) -> Option<Self> {
        Self::new(path.split('.'))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldPath::parse(&value).ok_or_else(|| format!("invalid field path '{}'", value))
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

/// Walks `path` inside `raw` and returns the numeric leaf, if present.
///
/// Does not modify `raw`.
pub fn extract(raw: &RawResponse, path: &FieldPath) -> Option<f64> {
    let mut current = raw;
    for segment in &path.segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    current.as_f64()
}
