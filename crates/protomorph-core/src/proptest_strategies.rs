//! Property-based testing strategies for generating test data
//!
//! This module provides proptest strategies for generating random
//! but valid trees, paths and templates for property testing.

#![cfg(test)]

use crate::path::{Path, PathSegment};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for object keys that need no quoting
pub fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_]{0,8}"
}

/// Strategy for scalar leaves
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| Value::Number(n.into())),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ]
}

/// Strategy for data trees with controlled depth
pub fn tree_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(
        4,  // max depth
        32, // max size
        5,  // items per collection
        |inner| {
            prop_oneof![
                vec(inner.clone(), 0..5).prop_map(Value::Array),
                btree_map(key_strategy(), inner, 0..5)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

/// Every concrete path that exists in `tree`, root included
pub fn existing_paths(tree: &Value) -> Vec<Path> {
    let mut paths = vec![Path::root()];
    collect_paths(tree, &Path::root(), &mut paths);
    paths
}

fn collect_paths(node: &Value, prefix: &Path, out: &mut Vec<Path>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                let path = prefix.append(PathSegment::key(key.clone()));
                out.push(path.clone());
                collect_paths(child, &path, out);
            }
        }
        Value::Array(items) => {
            let length = items.len() as i64;
            for (i, child) in items.iter().enumerate() {
                let path = prefix.index(i as i64);
                out.push(path.clone());
                // the same element addressed from the end
                out.push(prefix.index(i as i64 - length));
                collect_paths(child, &path, out);
            }
        }
        _ => {}
    }
}

/// A tree together with one path that exists in it
pub fn tree_with_existing_path() -> impl Strategy<Value = (Value, Path)> {
    tree_strategy().prop_flat_map(|tree| {
        let paths = existing_paths(&tree);
        (Just(tree), proptest::sample::select(paths))
    })
}

/// Template whose every leaf is a plain variable, plus data with the same keys
pub fn expression_template_with_data() -> impl Strategy<Value = (Value, Value)> {
    btree_map(key_strategy(), scalar_strategy(), 1..8).prop_map(|fields| {
        let mut template = Map::new();
        let mut data = Map::new();
        for (i, (key, value)) in fields.into_iter().enumerate() {
            template.insert(key.clone(), Value::String(format!("{{{{ var_{} }}}}", i)));
            data.insert(key, value);
        }
        (Value::Object(template), Value::Object(data))
    })
}

/// Road names without intersection separators or surrounding whitespace
pub fn road_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9路街道巷中山人民]{1,8}"
}
