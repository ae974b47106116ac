//! Field mapping rules and their configuration
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::processors::{Arity, ProcessorTable};
use crate::matching::ValidationIssue;
use crate::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Separator between the two sides of a rule set key
pub const PAIR_SEPARATOR: &str = " <-> ";

/// One path or several
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSpec {
    Single(Path),
    Multiple(Vec<Path>),
}

impl PathSpec {
    pub fn paths(&self) -> &[Path] {
        match self {
            PathSpec::Single(path) => std::slice::from_ref(path),
            PathSpec::Multiple(paths) => paths,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            PathSpec::Single(_) => Arity::One,
            PathSpec::Multiple(_) => Arity::Many,
        }
    }
}

impl From<&str> for PathSpec {
    fn from(path: &str) -> Self {
        PathSpec::Single(Path::parse(path).unwrap_or_else(|_| Path::root().child(path)))
    }
}

fn default_processor() -> String {
    "direct_mapping".to_string()
}

/// Reads `from`, runs `processor`, writes `to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMappingRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub from: PathSpec,
    pub to: PathSpec,
    #[serde(default = "default_processor")]
    pub processor: String,
}

impl FieldMappingRule {
    pub fn new(from: impl Into<PathSpec>, to: impl Into<PathSpec>, processor: impl Into<String>) -> Self {
        Self {
            name: None,
            from: from.into(),
            to: to.into(),
            processor: processor.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name used in logs and errors
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} -> {}", spec_label(&self.from), spec_label(&self.to)),
        }
    }
}

fn spec_label(spec: &PathSpec) -> String {
    match spec {
        PathSpec::Single(path) => path.to_string(),
        PathSpec::Multiple(paths) => {
            let names: Vec<String> = paths.iter().map(Path::to_string).collect();
            format!("[{}]", names.join(", "))
        }
    }
}

/// Rule sets and per-target default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    /// Rule sets keyed `"X <-> Y"`; either order finds the set
    pub rules: BTreeMap<String, Vec<FieldMappingRule>>,
    /// Default field values keyed by target template id or family
    pub defaults: BTreeMap<String, Map<String, Value>>,
}

impl RemapConfig {
    pub fn pair_key(a: &str, b: &str) -> String {
        format!("{}{}{}", a, PAIR_SEPARATOR, b)
    }

    /// Rules for the unordered pair `(a, b)`
    pub fn rule_set(&self, a: &str, b: &str) -> Option<&[FieldMappingRule]> {
        self.rules
            .get(&Self::pair_key(a, b))
            .or_else(|| self.rules.get(&Self::pair_key(b, a)))
            .map(Vec::as_slice)
    }

    pub fn defaults_for(&self, target: &str) -> Option<&Map<String, Value>> {
        self.defaults.get(target)
    }

    pub fn add_rule(&mut self, a: &str, b: &str, rule: FieldMappingRule) {
        let key = if self.rules.contains_key(&Self::pair_key(b, a)) {
            Self::pair_key(b, a)
        } else {
            Self::pair_key(a, b)
        };
        self.rules.entry(key).or_default().push(rule);
    }

    pub fn set_default(&mut self, target: impl Into<String>, field: impl Into<String>, value: Value) {
        self.defaults.entry(target.into()).or_default().insert(field.into(), value);
    }

    /// Intersection rules between the navigation templates `A-4` and `B-4`
    /// with the defaults of `B-4`
    pub fn intersection_routes() -> Self {
        let mut config = Self::default();
        config.add_rule(
            "A-4",
            "B-4",
            FieldMappingRule {
                name: Some("destination_split".to_string()),
                from: PathSpec::from("destination"),
                to: PathSpec::Multiple(vec![
                    Path::root().child("intersection").child("primary_road"),
                    Path::root().child("intersection").child("secondary_road"),
                ]),
                processor: "split_intersection".to_string(),
            },
        );
        config.add_rule(
            "A-4",
            "B-4",
            FieldMappingRule {
                name: Some("destination_combine".to_string()),
                from: PathSpec::Multiple(vec![
                    Path::root().child("intersection").child("primary_road"),
                    Path::root().child("intersection").child("secondary_road"),
                ]),
                to: PathSpec::from("destination"),
                processor: "combine_intersection".to_string(),
            },
        );
        let defaults = json!({
            "city": "上海",
            "district": "长宁区",
            "vehicle_type": "car",
            "avoid_tolls": false,
            "urgency": "normal"
        });
        if let Value::Object(fields) = defaults {
            config.defaults.insert("B-4".to_string(), fields);
        }
        config
    }

    /// Check every rule against the processors of `table`
    pub fn validate(&self, table: &ProcessorTable) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for (key, rules) in &self.rules {
            if key.split(PAIR_SEPARATOR).count() != 2 {
                issues.push(ValidationIssue::error(key, "rule set key must look like 'X <-> Y'"));
            }
            for rule in rules {
                let location = format!("{}/{}", key, rule.label());
                for spec in [&rule.from, &rule.to] {
                    if spec.paths().is_empty() {
                        issues.push(ValidationIssue::error(&location, "empty path list"));
                    }
                }
                let Some(processor) = table.get(&rule.processor) else {
                    issues.push(ValidationIssue::error(
                        &location,
                        format!("unknown processor '{}'", rule.processor),
                    ));
                    continue;
                };
                let signature = processor.signature();
                if signature.inputs != rule.from.arity() {
                    issues.push(
                        ValidationIssue::error(&location, format!("'{}' input arity mismatch", rule.processor))
                            .with_values(signature.inputs.to_string(), rule.from.arity().to_string()),
                    );
                }
                if signature.outputs == Arity::Many && rule.to.arity() == Arity::One {
                    issues.push(ValidationIssue::warning(
                        &location,
                        format!("'{}' yields several values for a single target", rule.processor),
                    ));
                }
            }
        }
        issues
    }
}
