//! Node-key parsing and construction

use std::fmt;

use indexmap::IndexMap;

/// Dimensions that always lead a generated key, in this order
const LEADING_DIMENSIONS: [&str; 3] = ["database", "schema", "group"];

/// Ordered dimension → value map accumulated while descending the tree.
///
/// Equality ignores order, so a context parsed back from a generated key
/// compares equal to the one the key was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    entries: IndexMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a node key (`""` or `dim=value/dim=value/...`).
    ///
    /// Segments without a dimension name before `=` are dropped. A repeated
    /// dimension keeps its first position and its last value.
    pub fn parse(key: &str) -> Self {
        let mut entries = IndexMap::new();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            match segment.split_once('=') {
                Some((dimension, value)) if !dimension.is_empty() => {
                    entries.insert(dimension.to_string(), value.to_string());
                }
                _ => {
                    tracing::warn!(key, segment, "ignoring malformed node key segment");
                }
            }
        }
        Self { entries }
    }

    /// Serialize back into a node key: `database`, `schema`, `group`, then
    /// every other dimension in insertion order.
    pub fn build_key(&self) -> String {
        let leading = LEADING_DIMENSIONS
            .iter()
            .filter_map(|dim| self.entries.get_key_value(*dim));
        let rest = self
            .entries
            .iter()
            .filter(|(dim, _)| !LEADING_DIMENSIONS.contains(&dim.as_str()));

        leading
            .chain(rest)
            .map(|(dim, value)| format!("{}={}", dim, value))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// A new context extended (or overridden) with one dimension
    pub fn with(&self, dimension: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.entries.insert(dimension.into(), value.into());
        next
    }

    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.entries.get(dimension).map(String::as_str)
    }

    pub fn contains(&self, dimension: &str) -> bool {
        self.entries.contains_key(dimension)
    }

    pub fn database(&self) -> Option<&str> {
        self.get("database")
    }

    pub fn schema(&self) -> Option<&str> {
        self.get("schema")
    }

    pub fn group(&self) -> Option<&str> {
        self.get("group")
    }

    /// `(dimension, value)` pairs in parse order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build_key())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
