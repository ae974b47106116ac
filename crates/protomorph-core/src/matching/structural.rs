//! Structural matching of data against templates
//!
//! Map keys in the template must be present in the data unless their value
//! is an expression leaf or the key is optional by policy. Sequences are
//! compared by their first element only, and literal leaves must be equal.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::validation::{ValidationIssue, ValidationReport};
use crate::config::OptionalFieldPolicy;
use crate::expression::{parse_leaf, parse_value};
use crate::path::{kind_of, Path};
use crate::template::markers::{marker_item, significant_items};
use serde_json::Value;

/// Decides whether data has a template's shape
#[derive(Debug, Clone, Default)]
pub struct StructuralMatcher {
    policy: OptionalFieldPolicy,
}

impl StructuralMatcher {
    pub fn new(policy: OptionalFieldPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &OptionalFieldPolicy {
        &self.policy
    }

    /// Boolean match, stopping at the first error
    pub fn is_match(&self, template: &Value, data: &Value) -> bool {
        let mut report = ValidationReport::default();
        self.walk(template, data, &Path::root(), &mut report, true)
    }

    /// Full report with every issue and the matched/unmatched paths
    pub fn validate(&self, template: &Value, data: &Value) -> ValidationReport {
        let mut report = ValidationReport::default();
        self.walk(template, data, &Path::root(), &mut report, false);
        report
    }

    fn walk(
        &self,
        template: &Value,
        data: &Value,
        path: &Path,
        report: &mut ValidationReport,
        fail_fast: bool,
    ) -> bool {
        match template {
            Value::Object(fields) => {
                let Value::Object(entries) = data else {
                    report.push(
                        ValidationIssue::error(path, "expected a map").with_values("object", kind_of(data)),
                    );
                    return false;
                };

                let mut valid = true;
                for (key, expected) in fields {
                    let child = path.child(key.clone());
                    if let Some(leaf) = parse_value(expected) {
                        if leaf.is_comment_only() {
                            continue;
                        }
                        if leaf.has_expressions() {
                            if entries.contains_key(key) {
                                report.matched_paths.push(child);
                            } else {
                                report.unmatched_paths.push(child);
                            }
                            continue;
                        }
                    }

                    match entries.get(key) {
                        Some(actual) => {
                            if !self.walk(expected, actual, &child, report, fail_fast) {
                                valid = false;
                                if fail_fast {
                                    return false;
                                }
                            }
                        }
                        None if self.is_optional(key, expected) => {
                            report.push(ValidationIssue::info(&child, "optional field absent"));
                            report.unmatched_paths.push(child);
                        }
                        None => {
                            report.push(ValidationIssue::error(&child, "missing required field"));
                            report.unmatched_paths.push(child);
                            valid = false;
                            if fail_fast {
                                return false;
                            }
                        }
                    }
                }

                if !fail_fast {
                    for key in entries.keys().filter(|key| !fields.contains_key(*key)) {
                        report.push(ValidationIssue::warning(path.child(key.clone()), "additional field"));
                    }
                }
                valid
            }
            Value::Array(items) => {
                let Value::Array(elements) = data else {
                    report.push(
                        ValidationIssue::error(path, "expected a sequence").with_values("array", kind_of(data)),
                    );
                    return false;
                };

                let representative = marker_item(items)
                    .or_else(|| significant_items(items).next().map(|(_, item)| item));
                match (representative, elements.first()) {
                    (None, None) => true,
                    (None, Some(_)) => {
                        report.push(
                            ValidationIssue::error(path, "expected an empty sequence")
                                .with_values("0 elements", format!("{} elements", elements.len())),
                        );
                        false
                    }
                    (Some(_), None) => true,
                    (Some(expected), Some(actual)) => {
                        self.walk(expected, actual, &path.index(0), report, fail_fast)
                    }
                }
            }
            Value::String(text) => {
                let leaf = parse_leaf(text);
                if leaf.has_expressions() || leaf.is_comment_only() {
                    report.matched_paths.push(path.clone());
                    return true;
                }
                self.compare_scalar(template, data, path, report)
            }
            _ => self.compare_scalar(template, data, path, report),
        }
    }

    fn compare_scalar(&self, expected: &Value, actual: &Value, path: &Path, report: &mut ValidationReport) -> bool {
        if scalars_equal(expected, actual) {
            report.matched_paths.push(path.clone());
            true
        } else {
            report.push(
                ValidationIssue::error(path, "value mismatch").with_values(expected.to_string(), actual.to_string()),
            );
            false
        }
    }

    /// A missing key is tolerated when its name matches the keyword policy,
    /// or when every expression beneath it declares a default
    fn is_optional(&self, key: &str, expected: &Value) -> bool {
        self.policy.is_optional_key(key) || (self.policy.honor_default_filter && defaults_only(expected))
    }
}

/// True when `value` holds expressions and all of them declare defaults
fn defaults_only(value: &Value) -> bool {
    fn visit(value: &Value, seen: &mut bool) -> bool {
        match value {
            Value::String(text) => {
                let leaf = parse_leaf(text);
                let all_defaulted = leaf.expressions().all(|expression| {
                    *seen = true;
                    expression.default.is_some()
                });
                all_defaulted
            }
            Value::Object(map) => map.values().all(|child| visit(child, seen)),
            Value::Array(items) => items.iter().all(|child| visit(child, seen)),
            _ => true,
        }
    }
    let mut seen = false;
    visit(value, &mut seen) && seen
}

fn scalars_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => expected == actual,
    }
}
