//! Dynamic array marker detection
//!
//! A sequence whose first element is the comment `{# array_dynamic: true #}`
//! is expanded once per element of the matching input collection. The next
//! element is the item template:
//!
//! ```json
//! "items": ["{# array_dynamic: true #}", {"name": "{{ name }}"}]
//! ```
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::{ArrayMarker, TemplateFragment};
use crate::expression::{is_comment_leaf, parse_value};
use crate::path::Path;
use serde_json::Value;

/// Item template of a marker sequence, if `items` is one
pub fn marker_item(items: &[Value]) -> Option<&Value> {
    let (first, rest) = items.split_first()?;
    if !parse_value(first).is_some_and(|leaf| leaf.is_array_marker()) {
        return None;
    }
    rest.iter().find(|item| !is_comment_leaf(item))
}

/// Sequence elements that are not comment-only strings, with their index
/// among the kept elements
pub fn significant_items(items: &[Value]) -> impl Iterator<Item = (usize, &Value)> {
    items
        .iter()
        .filter(|item| !is_comment_leaf(item))
        .enumerate()
}

/// Find every top-level marker in `tree`; markers inside item templates are
/// analyzed as part of their item
pub fn find_markers(tree: &Value) -> Vec<ArrayMarker> {
    let mut markers = Vec::new();
    collect(tree, &Path::root(), &mut markers);
    markers
}

fn collect(node: &Value, path: &Path, markers: &mut Vec<ArrayMarker>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                collect(value, &path.child(key.clone()), markers);
            }
        }
        Value::Array(items) => {
            if let Some(item) = marker_item(items) {
                log::debug!("Dynamic array marker at '{}'", path);
                markers.push(ArrayMarker {
                    field_path: path.clone(),
                    item: TemplateFragment::analyze(item.clone()),
                });
                return;
            }
            for (index, item) in significant_items(items) {
                collect(item, &path.index(index as i64), markers);
            }
        }
        _ => {}
    }
}
