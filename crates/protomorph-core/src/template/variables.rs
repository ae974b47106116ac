//! Variable mapping and value extraction
//!
//! [`map_variables`] walks a template once and records, for every variable,
//! the paths where it occurs, its filters, kind and default. Dynamic array
//! item templates are skipped here; they get their own table.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::markers::{marker_item, significant_items};
use crate::expression::{parse_leaf, Expression, ExpressionKind, Filter, Fragment, ParsedLeaf};
use crate::matching::ValidationIssue;
use crate::path::Path;
use crate::render::filters::KNOWN_FILTERS;
use crate::types::Bindings;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Everything known about one template variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    /// Qualified name, attributes included
    pub name: String,
    pub kind: ExpressionKind,
    /// Every occurrence, in declaration order
    pub paths: Vec<Path>,
    /// Union of filters over all occurrences
    pub filters: Vec<Filter>,
    pub default: Option<Value>,
    pub requires_context: bool,
}

impl VariableInfo {
    fn from_expression(expression: &Expression, path: &Path) -> Self {
        Self {
            name: expression.qualified_name(),
            kind: expression.kind,
            paths: vec![path.clone()],
            filters: expression.filters.clone(),
            default: expression.default.clone(),
            requires_context: expression.requires_context(),
        }
    }

    fn merge(&mut self, expression: &Expression, path: &Path) {
        if !self.paths.contains(path) {
            self.paths.push(path.clone());
        }
        for filter in &expression.filters {
            if !self.filters.contains(filter) {
                self.filters.push(filter.clone());
            }
        }
        if self.default.is_none() {
            self.default = expression.default.clone();
        }
        if self.kind != expression.kind {
            log::debug!(
                "Variable '{}' used as both {:?} and {:?}; keeping {:?}",
                self.name, self.kind, expression.kind, self.kind
            );
        }
    }
}

/// Literal skeleton of a leaf mixing text and expressions, used to pull
/// embedded values back out of a data string
#[derive(Debug, Clone)]
pub struct LeafPattern {
    regex: Regex,
    /// Variable name per capture group
    names: Vec<String>,
}

impl LeafPattern {
    fn build(leaf: &ParsedLeaf) -> Option<Self> {
        let mut pattern = String::from("(?s)^");
        let mut names = Vec::new();
        for fragment in &leaf.fragments {
            match fragment {
                Fragment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Fragment::Expression(expression) => {
                    pattern.push_str("(.*?)");
                    names.push(expression.qualified_name());
                }
                Fragment::Control(_) | Fragment::Invalid(_) => pattern.push_str(".*?"),
                Fragment::Comment(_) => {}
            }
        }
        pattern.push('$');
        if names.is_empty() {
            return None;
        }
        let regex = Regex::new(&pattern).ok()?;
        Some(Self { regex, names })
    }

    /// Captured text for `name` within `text`
    pub fn capture(&self, text: &str, name: &str) -> Option<String> {
        let group = self.names.iter().position(|n| n == name)? + 1;
        let captures = self.regex.captures(text)?;
        captures.get(group).map(|m| m.as_str().to_string())
    }
}

impl PartialEq for LeafPattern {
    fn eq(&self, other: &Self) -> bool {
        self.regex.as_str() == other.regex.as_str() && self.names == other.names
    }
}

/// Variables of one template scope, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTable {
    entries: Vec<VariableInfo>,
    index: HashMap<String, usize>,
    patterns: HashMap<Path, LeafPattern>,
}

impl VariableTable {
    pub fn get(&self, name: &str) -> Option<&VariableInfo> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableInfo> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|info| info.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn of_kind(&self, kind: ExpressionKind) -> impl Iterator<Item = &VariableInfo> {
        self.entries.iter().filter(move |info| info.kind == kind)
    }

    pub fn has_kind(&self, kind: ExpressionKind) -> bool {
        self.of_kind(kind).next().is_some()
    }

    /// True when any variable needs the conversion context to resolve
    pub fn requires_context(&self) -> bool {
        self.entries.iter().any(|info| info.requires_context)
    }

    /// Every path where some variable occurs
    pub fn expected_paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().flat_map(|info| info.paths.iter())
    }

    /// Variables using the filter `name` anywhere
    pub fn by_filter<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a VariableInfo> + 'a {
        self.entries
            .iter()
            .filter(move |info| info.filters.iter().any(|filter| filter.name == name))
    }

    /// Variables with an occurrence matching `pattern` (see [`Path::matches`])
    pub fn by_path<'a>(&'a self, pattern: &'a Path) -> impl Iterator<Item = &'a VariableInfo> + 'a {
        self.entries
            .iter()
            .filter(move |info| info.paths.iter().any(|path| path.matches(pattern)))
    }

    /// Load-time checks: filters the renderer does not know
    pub fn validate(&self) -> Vec<ValidationIssue> {
        self.validate_within(&Path::root())
    }

    /// [`VariableTable::validate`] for a table whose paths are relative to `base`
    pub fn validate_within(&self, base: &Path) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for info in &self.entries {
            for filter in &info.filters {
                if !KNOWN_FILTERS.contains(&filter.name.as_str()) {
                    let at = info.paths.first().map(|path| path.prepend(base)).unwrap_or_else(|| base.clone());
                    issues.push(ValidationIssue::warning(
                        at,
                        format!("unknown filter '{}' used by variable '{}'", filter.name, info.name),
                    ));
                }
            }
        }
        issues
    }

    /// One warning per variable occurrence matching none of `available`,
    /// which may hold wildcard patterns
    pub fn validate_paths(&self, available: &[Path]) -> Vec<ValidationIssue> {
        self.entries
            .iter()
            .flat_map(|info| info.paths.iter().map(move |path| (info, path)))
            .filter(|(_, path)| !available.iter().any(|pattern| path.matches(pattern)))
            .map(|(info, path)| {
                ValidationIssue::warning(path, format!("variable '{}' references an unknown path", info.name))
            })
            .collect()
    }

    fn record(&mut self, expression: &Expression, path: &Path) {
        let name = expression.qualified_name();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].merge(expression, path),
            None => {
                self.index.insert(name, self.entries.len());
                self.entries.push(VariableInfo::from_expression(expression, path));
            }
        }
    }

    /// Value of one variable in `data`: the first path yielding a non-null
    /// value wins, then the declared default
    pub fn resolve(&self, info: &VariableInfo, data: &Value) -> Option<Value> {
        self.resolve_from_data(info, data)
            .or_else(|| info.default.clone().filter(|value| !value.is_null()))
    }

    /// Like [`VariableTable::resolve`] without falling back to the default
    pub fn resolve_from_data(&self, info: &VariableInfo, data: &Value) -> Option<Value> {
        for path in &info.paths {
            let Some(found) = path.lookup(data) else {
                continue;
            };
            if let Some(pattern) = self.patterns.get(path) {
                if let Some(captured) = found.as_str().and_then(|text| pattern.capture(text, &info.name)) {
                    return Some(Value::String(captured));
                }
                continue;
            }
            if !found.is_null() {
                return Some(found.clone());
            }
        }
        None
    }

    /// Bindings for every variable resolvable in `data`.
    ///
    /// Unresolvable variables stay unbound; special and mapping variables are
    /// resolved later through the context and the remapper.
    pub fn extract_values(&self, data: &Value) -> Bindings {
        let mut bindings = Bindings::new();
        for info in &self.entries {
            if let Some(value) = self.resolve(info, data) {
                bindings.insert(info.name.clone(), value);
            }
        }
        bindings
    }
}

/// Build the variable table of a template scope
pub fn map_variables(tree: &Value) -> VariableTable {
    let mut table = VariableTable::default();
    walk(tree, &Path::root(), &mut table);
    table
}

fn walk(node: &Value, path: &Path, table: &mut VariableTable) {
    match node {
        Value::String(text) => {
            let leaf = parse_leaf(text);
            let mut any = false;
            for expression in leaf.expressions() {
                table.record(expression, path);
                any = true;
            }
            if any && leaf.single_expression().is_none() {
                if let Some(pattern) = LeafPattern::build(&leaf) {
                    table.patterns.insert(path.clone(), pattern);
                }
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                walk(value, &path.child(key.clone()), table);
            }
        }
        Value::Array(items) => {
            if marker_item(items).is_some() {
                return;
            }
            for (index, item) in significant_items(items) {
                walk(item, &path.index(index as i64), table);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_collects_paths_and_filters() {
        let template = json!({
            "slots": {"name": "{{ person | upper }}", "alias": "{{ person | lower }}"},
            "note": "{{ __sid }}",
            "list": ["{# comment #}", {"v": "{{ value }}"}]
        });
        let table = map_variables(&template);
        let person = table.get("person").unwrap();
        assert_eq!(person.paths.len(), 2);
        assert_eq!(person.filters, vec![Filter::new("upper"), Filter::new("lower")]);
        assert!(!person.requires_context);

        let sid = table.get("__sid").unwrap();
        assert_eq!(sid.kind, ExpressionKind::Special);
        assert!(sid.requires_context);

        assert_eq!(table.get("value").unwrap().paths[0].to_string(), "list[0].v");
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["person", "__sid", "value"]);
    }

    #[test]
    fn test_item_templates_not_merged() {
        let template = json!({
            "op": "{{ op }}",
            "data": ["{# array_dynamic: true #}", {"name": "{{ name }}"}]
        });
        let table = map_variables(&template);
        assert!(table.get("op").is_some());
        assert!(table.get("name").is_none());
    }

    #[test]
    fn test_extract_first_non_null_path_then_default() {
        let template = json!({
            "a": "{{ x }}",
            "b": "{{ x }}",
            "c": "{{ y | default('fallback') }}",
            "d": "{{ z }}"
        });
        let table = map_variables(&template);
        let bindings = table.extract_values(&json!({"a": null, "b": 7}));
        assert_eq!(bindings.get("x"), Some(&json!(7)));
        assert_eq!(bindings.get("y"), Some(&json!("fallback")));
        assert!(!bindings.contains_key("z"));
    }

    #[test]
    fn test_extract_embedded_values() {
        let template = json!({"text": "Call {{ person }} at {{ time }}."});
        let table = map_variables(&template);
        let bindings = table.extract_values(&json!({"text": "Call 张三 at 9am."}));
        assert_eq!(bindings.get("person"), Some(&json!("张三")));
        assert_eq!(bindings.get("time"), Some(&json!("9am")));

        let mismatch = table.extract_values(&json!({"text": "Email 张三"}));
        assert!(mismatch.is_empty());
    }

    #[test]
    fn test_attribute_names_are_qualified() {
        let table = map_variables(&json!({"city": "{{ user.address.city }}"}));
        let info = table.get("user.address.city").unwrap();
        assert_eq!(info.kind, ExpressionKind::Regular);
    }

    #[test]
    fn test_lookup_by_filter_and_path() {
        let table = map_variables(&json!({
            "slots": {"name": "{{ person | upper }}", "city": "{{ city | title }}"},
            "list": [{"v": "{{ value | upper }}"}, {"v": "{{ other }}"}]
        }));
        let upper: Vec<&str> = table.by_filter("upper").map(|info| info.name.as_str()).collect();
        assert_eq!(upper, vec!["person", "value"]);
        assert_eq!(table.by_filter("lower").count(), 0);

        let pattern = Path::parse("list[*].v").unwrap();
        let listed: Vec<&str> = table.by_path(&pattern).map(|info| info.name.as_str()).collect();
        assert_eq!(listed, vec!["value", "other"]);
        assert_eq!(table.by_path(&Path::parse("slots.name").unwrap()).count(), 1);
    }

    #[test]
    fn test_validate_reports_unknown_filters() {
        let table = map_variables(&json!({"a": "{{ a | upper }}", "b": "{{ b | reverse }}"}));
        let issues = table.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "b");
        assert!(!issues[0].is_error());
        assert!(issues[0].message.contains("'reverse'"));

        assert!(map_variables(&json!({"a": "{{ a | trim | lower }}"})).validate().is_empty());
    }

    #[test]
    fn test_validate_paths_against_available() {
        let table = map_variables(&json!({"slots": {"name": "{{ person }}"}, "sid": "{{ __sid }}"}));
        let available = vec![Path::parse("slots.name").unwrap()];
        let issues = table.validate_paths(&available);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "sid");
        assert!(issues[0].message.contains("__sid"));
    }

    #[test]
    fn test_kind_queries() {
        let table = map_variables(&json!({"a": "{{ a }}", "b": "${{ road }}"}));
        assert!(table.has_kind(ExpressionKind::Mapping));
        assert!(!table.has_kind(ExpressionKind::Special));
        assert!(table.requires_context());
        assert_eq!(table.expected_paths().count(), 2);
    }
}
