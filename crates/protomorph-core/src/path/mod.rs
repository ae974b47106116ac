//! Path language for addressing nodes in data trees
//!
//! Paths are dotted/bracketed expressions such as `a.b[0].c`, `a.b[*]` or
//! `a.meta?`. A parsed [`Path`] is a plain sequence of [`PathSegment`]s with
//! structural equality and hashing, so it can key maps and be compared
//! across templates and data.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

pub mod error;
pub mod ops;
pub mod parser;


pub use error::PathError;
pub use parser::Parser;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Result alias for path operations
pub type PathResult<T> = std::result::Result<T, PathError>;

/// A single step in a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Map lookup; optional keys resolve to null when absent
    ObjectKey { name: String, optional: bool },
    /// Sequence index; negative values count from the end
    ArrayIndex(i64),
    /// Every element of a sequence
    ArrayWildcard,
}

impl PathSegment {
    pub fn key(name: impl Into<String>) -> Self {
        Self::ObjectKey { name: name.into(), optional: false }
    }

    pub fn optional_key(name: impl Into<String>) -> Self {
        Self::ObjectKey { name: name.into(), optional: true }
    }

    /// Key name for object segments
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::ObjectKey { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::ObjectKey { optional: true, .. })
    }
}

/// A parsed path expression
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// The empty path, addressing the root of a tree
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Parse a path expression
    pub fn parse(input: &str) -> PathResult<Self> {
        Parser::new(input).parse()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, PathSegment::ArrayWildcard))
    }

    /// New path with `segment` appended
    pub fn append(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }

    pub fn child(&self, key: impl Into<String>) -> Self {
        self.append(PathSegment::key(key))
    }

    pub fn index(&self, index: i64) -> Self {
        self.append(PathSegment::ArrayIndex(index))
    }

    /// Concatenate two paths
    pub fn join(&self, other: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend_from_slice(&other.segments);
        Self { segments }
    }

    /// Parent path; the root has none and a single segment's parent is the root
    pub fn parent(&self) -> Option<Path> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn starts_with(&self, base: &Path) -> bool {
        self.segments.starts_with(&base.segments)
    }

    /// Remaining segments after `base`, failing if `base` is not an ancestor
    pub fn relative_to(&self, base: &Path) -> PathResult<Path> {
        if !self.starts_with(base) {
            return Err(PathError::not_descendant(self.to_string(), base.to_string()));
        }
        Ok(Self {
            segments: self.segments[base.len()..].to_vec(),
        })
    }

    /// New path with `base` in front of this one
    pub fn prepend(&self, base: &Path) -> Self {
        base.join(self)
    }

    /// Longest shared prefix, or `None` when the first segments differ
    pub fn common_ancestor(&self, other: &Path) -> Option<Path> {
        let shared = self
            .segments
            .iter()
            .zip(&other.segments)
            .take_while(|(a, b)| a == b)
            .count();
        (shared > 0).then(|| self.prefix(shared))
    }

    /// Segment-wise match against `pattern`.
    ///
    /// A wildcard in the pattern matches any index, key names compare
    /// without their optional flag, and both paths must be the same length.
    pub fn matches(&self, pattern: &Path) -> bool {
        self.segments.len() == pattern.segments.len()
            && self
                .segments
                .iter()
                .zip(&pattern.segments)
                .all(|(segment, expected)| match (segment, expected) {
                    (PathSegment::ArrayIndex(_) | PathSegment::ArrayWildcard, PathSegment::ArrayWildcard) => true,
                    (PathSegment::ObjectKey { name, .. }, PathSegment::ObjectKey { name: wanted, .. }) => name == wanted,
                    (PathSegment::ArrayIndex(a), PathSegment::ArrayIndex(b)) => a == b,
                    _ => false,
                })
    }

    /// Prefix made of the first `len` segments, used in error messages
    pub(crate) fn prefix(&self, len: usize) -> Path {
        Self {
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }
}

/// Short type name of a tree node for diagnostics
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn needs_quoting(name: &str) -> bool {
    name.trim().is_empty()
        || name.ends_with('?')
        || name.contains(['.', '[', ']', '\'', '"'])
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::ObjectKey { name, optional } => {
                    if needs_quoting(name) {
                        let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
                        write!(f, "['{}']", escaped)?;
                    } else {
                        if i > 0 {
                            write!(f, ".")?;
                        }
                        write!(f, "{}", name)?;
                    }
                    if *optional {
                        write!(f, "?")?;
                    }
                }
                PathSegment::ArrayIndex(index) => write!(f, "[{}]", index)?,
                PathSegment::ArrayWildcard => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> PathResult<Self> {
        Path::parse(s)
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self::from_segments(segments)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Path::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Get the value at `path` (convenience wrapper around [`Path::get`])
pub fn get(data: &Value, path: &str) -> crate::Result<Value> {
    Ok(Path::parse(path)?.get(data)?)
}

/// Set the value at `path` (convenience wrapper around [`Path::set`])
pub fn set(data: &mut Value, path: &str, value: Value) -> crate::Result<()> {
    Ok(Path::parse(path)?.set(data, value)?)
}
