//! Path evaluation against data trees
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::error::PathError;
use super::{kind_of, Path, PathResult, PathSegment};
use serde_json::{Map, Value};

/// Most null elements [`Path::set`] will insert to reach an index past the end
pub const MAX_SET_PADDING: usize = 1024;

/// Resolve a possibly negative index against a sequence length
fn normalize_index(index: i64, length: usize) -> Option<usize> {
    let resolved = if index < 0 { length as i64 + index } else { index };
    if resolved >= 0 && (resolved as usize) < length {
        Some(resolved as usize)
    } else {
        None
    }
}

/// Empty container suited to the segment that will be applied next
fn container_for(next: Option<&PathSegment>) -> Value {
    match next {
        Some(PathSegment::ArrayIndex(_)) | Some(PathSegment::ArrayWildcard) => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    }
}

impl Path {
    /// Evaluate the path against `data`.
    ///
    /// A wildcard followed by more segments maps the remainder over every
    /// element, skipping elements where the remainder is missing. A missing
    /// optional key yields `null`; a missing required key is an error.
    pub fn get(&self, data: &Value) -> PathResult<Value> {
        self.resolve(data, 0)
    }

    fn resolve(&self, current: &Value, depth: usize) -> PathResult<Value> {
        let Some(segment) = self.segments.get(depth) else {
            return Ok(current.clone());
        };

        match segment {
            PathSegment::ObjectKey { name, optional } => match current {
                Value::Object(map) => match map.get(name) {
                    Some(next) => self.resolve(next, depth + 1),
                    None if *optional => Ok(Value::Null),
                    None => Err(PathError::key_not_found(name, self.prefix(depth + 1).to_string())),
                },
                Value::Null if *optional => Ok(Value::Null),
                other => Err(PathError::type_mismatch(
                    "object",
                    kind_of(other),
                    self.prefix(depth).to_string(),
                )),
            },
            PathSegment::ArrayIndex(index) => match current {
                Value::Array(items) => {
                    let position = normalize_index(*index, items.len()).ok_or_else(|| {
                        PathError::index_out_of_bounds(*index, items.len(), self.prefix(depth + 1).to_string())
                    })?;
                    self.resolve(&items[position], depth + 1)
                }
                other => Err(PathError::type_mismatch(
                    "array",
                    kind_of(other),
                    self.prefix(depth).to_string(),
                )),
            },
            PathSegment::ArrayWildcard => match current {
                Value::Array(items) => {
                    let mut collected = Vec::with_capacity(items.len());
                    for item in items {
                        match self.resolve(item, depth + 1) {
                            Ok(value) => collected.push(value),
                            Err(err) if err.is_missing() => continue,
                            Err(err) => return Err(err),
                        }
                    }
                    Ok(Value::Array(collected))
                }
                other => Err(PathError::type_mismatch(
                    "array",
                    kind_of(other),
                    self.prefix(depth).to_string(),
                )),
            },
        }
    }

    /// Borrowing lookup without wildcard or optional semantics
    pub fn lookup<'a>(&self, data: &'a Value) -> Option<&'a Value> {
        let mut current = data;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::ObjectKey { name, .. }, Value::Object(map)) => map.get(name)?,
                (PathSegment::ArrayIndex(index), Value::Array(items)) => {
                    &items[normalize_index(*index, items.len())?]
                }
                _ => return None,
            };
        }
        Some(current)
    }

    fn lookup_mut<'a>(&self, data: &'a mut Value, len: usize) -> Option<&'a mut Value> {
        let mut current = data;
        for segment in &self.segments[..len] {
            current = match (segment, current) {
                (PathSegment::ObjectKey { name, .. }, Value::Object(map)) => map.get_mut(name)?,
                (PathSegment::ArrayIndex(index), Value::Array(items)) => {
                    let position = normalize_index(*index, items.len())?;
                    &mut items[position]
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// True when every segment is actually present in `data`.
    ///
    /// Unlike [`Path::get`], a missing optional key counts as absent. A
    /// wildcard exists when the remainder exists in at least one element.
    pub fn exists(&self, data: &Value) -> bool {
        self.exists_from(data, 0)
    }

    fn exists_from(&self, current: &Value, depth: usize) -> bool {
        let Some(segment) = self.segments.get(depth) else {
            return true;
        };
        match (segment, current) {
            (PathSegment::ObjectKey { name, .. }, Value::Object(map)) => map
                .get(name)
                .is_some_and(|next| self.exists_from(next, depth + 1)),
            (PathSegment::ArrayIndex(index), Value::Array(items)) => normalize_index(*index, items.len())
                .is_some_and(|position| self.exists_from(&items[position], depth + 1)),
            (PathSegment::ArrayWildcard, Value::Array(items)) => {
                if depth + 1 == self.segments.len() {
                    return true;
                }
                items.iter().any(|item| self.exists_from(item, depth + 1))
            }
            _ => false,
        }
    }

    /// Write `value` at the path, creating intermediate containers.
    ///
    /// Null nodes on the way are replaced by containers. A positive index past
    /// the end pads the sequence with nulls, at most [`MAX_SET_PADDING`] of
    /// them; a negative index is normalized against the current length.
    pub fn set(&self, data: &mut Value, value: Value) -> PathResult<()> {
        if self.is_empty() {
            return Err(PathError::empty_path("set"));
        }
        if self.has_wildcard() {
            return Err(PathError::unsupported("set", self.to_string()));
        }

        let last = self.segments.len() - 1;
        let mut current = data;
        for (depth, segment) in self.segments.iter().enumerate() {
            let next = self.segments.get(depth + 1);
            match segment {
                PathSegment::ObjectKey { name, .. } => {
                    if current.is_null() {
                        *current = Value::Object(Map::new());
                    }
                    let map = match current {
                        Value::Object(map) => map,
                        other => {
                            return Err(PathError::type_mismatch(
                                "object",
                                kind_of(other),
                                self.prefix(depth).to_string(),
                            ))
                        }
                    };
                    if depth == last {
                        map.insert(name.clone(), value);
                        return Ok(());
                    }
                    current = map.entry(name.clone()).or_insert_with(|| container_for(next));
                }
                PathSegment::ArrayIndex(index) => {
                    if current.is_null() {
                        *current = Value::Array(Vec::new());
                    }
                    let items = match current {
                        Value::Array(items) => items,
                        other => {
                            return Err(PathError::type_mismatch(
                                "array",
                                kind_of(other),
                                self.prefix(depth).to_string(),
                            ))
                        }
                    };
                    let position = if *index >= 0 {
                        let position = usize::try_from(*index)
                            .ok()
                            .filter(|position| *position <= items.len().saturating_add(MAX_SET_PADDING))
                            .ok_or_else(|| {
                                PathError::index_out_of_bounds(*index, items.len(), self.prefix(depth + 1).to_string())
                            })?;
                        if items.len() <= position {
                            items.resize(position + 1, Value::Null);
                        }
                        position
                    } else {
                        normalize_index(*index, items.len()).ok_or_else(|| {
                            PathError::index_out_of_bounds(*index, items.len(), self.prefix(depth + 1).to_string())
                        })?
                    };
                    if depth == last {
                        items[position] = value;
                        return Ok(());
                    }
                    current = &mut items[position];
                }
                PathSegment::ArrayWildcard => {
                    return Err(PathError::unsupported("set", self.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Remove the node at the path, returning it when something was there
    pub fn delete(&self, data: &mut Value) -> PathResult<Option<Value>> {
        let Some(last) = self.segments.last() else {
            return Err(PathError::empty_path("delete"));
        };
        if self.has_wildcard() {
            return Err(PathError::unsupported("delete", self.to_string()));
        }

        let Some(parent) = self.lookup_mut(data, self.segments.len() - 1) else {
            return Ok(None);
        };
        match (last, parent) {
            (PathSegment::ObjectKey { name, .. }, Value::Object(map)) => Ok(map.shift_remove(name)),
            (PathSegment::ArrayIndex(index), Value::Array(items)) => {
                Ok(normalize_index(*index, items.len()).map(|position| items.remove(position)))
            }
            (PathSegment::ObjectKey { .. }, other) => Err(PathError::type_mismatch(
                "object",
                kind_of(other),
                self.prefix(self.len() - 1).to_string(),
            )),
            (_, other) => Err(PathError::type_mismatch(
                "array",
                kind_of(other),
                self.prefix(self.len() - 1).to_string(),
            )),
        }
    }
}
