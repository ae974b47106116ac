//! Dynamic array expansion
//!
//! A marker sequence in a target template renders its item template once per
//! element of the matching source sequence. Each element gets its own
//! [`ConversionContext`] carrying the index, total, and element data.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::context::ConversionContext;
use crate::expression::is_comment_leaf;
use crate::template::{ArrayMarker, TemplateFragment};
use crate::types::{Bindings, DebugEventKind};
use serde_json::Value;
use std::collections::HashSet;

/// Expands marker sequences against source data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayExpander {
    max_depth: usize,
}

impl Default for ArrayExpander {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

impl ArrayExpander {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Source sequence for `marker`.
    ///
    /// The declared path is resolved against the enclosing element, or the
    /// whole source tree outside an array. When it does not lead to a
    /// sequence, the first non-empty sequence field is used instead.
    pub fn source_sequence<'a>(&self, marker: &ArrayMarker, context: &'a ConversionContext) -> Option<&'a [Value]> {
        let scope = context.current_element().unwrap_or_else(|| context.source_data());
        if let Some(Value::Array(elements)) = marker.field_path.lookup(scope) {
            return Some(elements.as_slice());
        }

        let fallback = first_sequence_field(scope)?;
        log::debug!("No sequence at '{}', using first sequence field", marker.field_path);
        context.record(
            DebugEventKind::ArraySourceHeuristic,
            format!("no sequence at '{}', used the first non-empty sequence field", marker.field_path),
        );
        Some(fallback)
    }

    /// Bindings for element `index`: the enclosing scope's bindings, then
    /// values read from the element through the item template, then the
    /// `name_<index>` bindings of the enclosing scope with the suffix removed.
    ///
    /// Indexed families of the enclosing scope (every `name_<n>` whose
    /// `name_0` is bound) are consumed here and not passed to the element,
    /// so a nested sequence only sees the indices of its own elements.
    pub fn element_bindings(&self, item: &TemplateFragment, context: &ConversionContext, index: usize, element: &Value) -> Bindings {
        let parent = context.variables();
        let families: HashSet<&str> = parent
            .keys()
            .filter_map(|name| split_indexed(name))
            .filter(|(_, position)| *position == 0)
            .map(|(base, _)| base)
            .collect();

        let mut bindings: Bindings = parent
            .iter()
            .filter(|(name, _)| !split_indexed(name).is_some_and(|(base, _)| families.contains(base)))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if element.is_object() {
            bindings.extend(item.extract(element));
        }
        for (name, value) in parent {
            if let Some((base, position)) = split_indexed(name) {
                if position == index {
                    bindings.insert(base.to_string(), value.clone());
                }
            }
        }
        bindings
    }

    /// Render one item per source element. `context` must be positioned at
    /// the output sequence; `render_item` renders an item template in an
    /// element context.
    pub fn expand<F>(&self, marker: &ArrayMarker, context: &ConversionContext, mut render_item: F) -> Value
    where
        F: FnMut(&TemplateFragment, &ConversionContext) -> Value,
    {
        if context.render_depth() >= self.max_depth {
            log::warn!("Render depth {} reached at '{}'", self.max_depth, context.current_path());
            context.record(
                DebugEventKind::DepthLimit,
                format!("dynamic array not expanded beyond depth {}", self.max_depth),
            );
            return Value::Array(Vec::new());
        }

        let Some(elements) = self.source_sequence(marker, context) else {
            log::warn!("No source sequence for dynamic array '{}'", marker.field_path);
            context.record(
                DebugEventKind::ArraySourceMissing,
                format!("no source sequence for '{}'", marker.field_path),
            );
            return Value::Array(Vec::new());
        };

        let total = elements.len();
        log::debug!("Expanding '{}' over {} element(s)", marker.field_path, total);
        let rendered = elements
            .iter()
            .enumerate()
            .map(|(index, element)| {
                let bindings = self.element_bindings(&marker.item, context, index, element);
                let child = context.for_element(&marker.field_path, index, total, element, bindings);
                render_item(&marker.item, &child)
            })
            .collect();
        Value::Array(rendered)
    }
}

/// Splits `name_<digits>` into its base and position
fn split_indexed(name: &str) -> Option<(&str, usize)> {
    let (base, digits) = name.rsplit_once('_')?;
    if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((base, digits.parse().ok()?))
}

/// First non-empty sequence field of a map, skipping marker-only sequences
fn first_sequence_field(scope: &Value) -> Option<&[Value]> {
    scope.as_object()?.values().find_map(|value| match value {
        Value::Array(items) if !items.is_empty() && !items.iter().all(is_comment_leaf) => Some(items.as_slice()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathSegment;
    use crate::template::Template;
    use serde_json::json;

    fn marker_template() -> Template {
        Template::analyze(
            "C-3",
            "C",
            json!({"items": ["{# array_dynamic: true #}", {"name": "{{ name }}"}]}),
        )
        .unwrap()
    }

    fn root(data: Value, variables: Bindings) -> ConversionContext {
        ConversionContext::new("A", "C", data, variables)
    }

    fn names(value: &Value) -> Vec<Value> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["name"].clone())
            .collect()
    }

    fn echo_name(_: &TemplateFragment, ctx: &ConversionContext) -> Value {
        json!({
            "name": ctx.variable("name").cloned().unwrap_or(Value::Null),
            "index": ctx.array_index(),
            "last": ctx.is_last()
        })
    }

    #[test]
    fn test_expands_each_element_in_order() {
        let template = marker_template();
        let marker = &template.array_markers()[0];
        let ctx = root(json!({"items": [{"name": "a"}, {"name": "b"}, {"name": "c"}]}), Bindings::new());
        let out = ArrayExpander::default().expand(marker, &ctx.at(PathSegment::key("items")), echo_name);
        assert_eq!(names(&out), vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(out[2]["last"], json!(true));
        assert_eq!(out[1]["index"], json!(1));
    }

    #[test]
    fn test_indexed_parent_bindings_win() {
        let template = marker_template();
        let marker = &template.array_markers()[0];
        let mut variables = Bindings::new();
        variables.insert("name_0".to_string(), json!("from-source"));
        variables.insert("op".to_string(), json!("sync"));
        let ctx = root(json!({"items": [{"name": "a"}, {"name": "b"}]}), variables);

        let element = json!({"name": "a"});
        let bindings = ArrayExpander::default().element_bindings(&marker.item, &ctx, 0, &element);
        assert_eq!(bindings.get("name"), Some(&json!("from-source")));
        assert_eq!(bindings.get("op"), Some(&json!("sync")));

        let second = ArrayExpander::default().element_bindings(&marker.item, &ctx, 1, &json!({"name": "b"}));
        assert_eq!(second.get("name"), Some(&json!("b")));
    }

    #[test]
    fn test_indexed_families_are_consumed_by_the_element_scope() {
        let template = marker_template();
        let marker = &template.array_markers()[0];
        let mut variables = Bindings::new();
        variables.insert("id_0".to_string(), json!("o1"));
        variables.insert("id_1".to_string(), json!("o2"));
        variables.insert("room_2".to_string(), json!("kept"));
        let ctx = root(json!({"items": [{"name": "a"}, {"name": "b"}]}), variables);

        let bindings = ArrayExpander::default().element_bindings(&marker.item, &ctx, 1, &json!({"name": "b"}));
        assert_eq!(bindings.get("id"), Some(&json!("o2")));
        assert!(!bindings.contains_key("id_0"));
        assert!(!bindings.contains_key("id_1"));
        assert_eq!(bindings.get("room_2"), Some(&json!("kept")));
    }

    #[test]
    fn test_split_indexed() {
        assert_eq!(split_indexed("name_12"), Some(("name", 12)));
        assert_eq!(split_indexed("sku_0_1"), Some(("sku_0", 1)));
        assert_eq!(split_indexed("_3"), None);
        assert_eq!(split_indexed("name_"), None);
        assert_eq!(split_indexed("name_x"), None);
    }

    #[test]
    fn test_heuristic_source() {
        let template = marker_template();
        let marker = &template.array_markers()[0];
        let ctx = root(
            json!({"notes": ["{# array_dynamic: true #}"], "records": [{"name": "x"}]}),
            Bindings::new(),
        );
        let out = ArrayExpander::default().expand(marker, &ctx, echo_name);
        assert_eq!(names(&out), vec![json!("x")]);
        assert_eq!(ctx.debug_events()[0].kind, DebugEventKind::ArraySourceHeuristic);
    }

    #[test]
    fn test_missing_source_and_depth_limit() {
        let template = marker_template();
        let marker = &template.array_markers()[0];
        let ctx = root(json!({"count": 3}), Bindings::new());
        assert_eq!(ArrayExpander::default().expand(marker, &ctx, echo_name), json!([]));
        assert_eq!(ctx.debug_events()[0].kind, DebugEventKind::ArraySourceMissing);

        let ctx = root(json!({"items": [{"name": "a"}]}), Bindings::new());
        assert_eq!(ArrayExpander::new(0).expand(marker, &ctx, echo_name), json!([]));
        assert_eq!(ctx.debug_events()[0].kind, DebugEventKind::DepthLimit);
    }
}
