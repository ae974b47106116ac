//! Field remapping for mapping expressions
//!
//! Some fields cannot be copied between families: one family stores an
//! intersection as a single `destination` string, another as two road
//! fields. Mapping expressions (`${{ intersection.primary_road }}`) are
//! resolved here by running the rule set declared for the pair of
//! templates or families involved.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

pub mod processors;
pub mod rules;


pub use processors::{
    combine_intersection, split_intersection, Arity, FnProcessor, Processor, ProcessorError, ProcessorSignature,
    ProcessorTable,
};
pub use rules::{FieldMappingRule, PathSpec, RemapConfig};

use crate::error::Error;
use crate::path::Path;
use crate::types::Bindings;
use serde_json::Value;

/// Templates and families on both sides of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapScope<'a> {
    pub source_id: &'a str,
    pub source_family: &'a str,
    pub target_id: &'a str,
    pub target_family: &'a str,
}

/// Values produced by a rule set, keyed by target path string, and the
/// rules that failed along the way
#[derive(Debug, Default)]
pub struct RemapOutcome {
    pub values: Bindings,
    pub failures: Vec<Error>,
}

/// Applies remapping rules with a processor table
#[derive(Debug, Clone, Default)]
pub struct FieldRemapper {
    config: RemapConfig,
    processors: ProcessorTable,
}

impl FieldRemapper {
    pub fn new(config: RemapConfig, processors: ProcessorTable) -> Self {
        Self { config, processors }
    }

    /// Remapper using the builtin processors
    pub fn with_builtins(config: RemapConfig) -> Self {
        Self::new(config, ProcessorTable::with_builtins())
    }

    pub fn config(&self) -> &RemapConfig {
        &self.config
    }

    pub fn processors(&self) -> &ProcessorTable {
        &self.processors
    }

    /// Run the rules for the unordered pair `(source, target)` and fill in
    /// the defaults registered for `target`.
    ///
    /// `from` paths are read from `bindings` by their string form first,
    /// then from `source_data`. A failing rule is recorded and skipped.
    pub fn process_mapping(&self, bindings: &Bindings, source: &str, target: &str, source_data: &Value) -> RemapOutcome {
        let mut outcome = RemapOutcome::default();

        match self.config.rule_set(source, target) {
            Some(rules) => {
                for rule in rules {
                    if let Err(err) = self.apply_rule(rule, bindings, source_data, &mut outcome.values) {
                        log::warn!("Skipping remap rule '{}' for {} -> {}: {}", rule.label(), source, target, err);
                        outcome.failures.push(err);
                    }
                }
            }
            None => log::debug!("No remap rules between '{}' and '{}'", source, target),
        }

        if let Some(defaults) = self.config.defaults_for(target) {
            apply_defaults(&mut outcome.values, defaults, bindings);
        }
        outcome
    }

    /// Like [`FieldRemapper::process_mapping`], choosing the template-id pair
    /// when rules exist for it and the family pair otherwise. Defaults come
    /// from the target id, then the target family.
    pub fn process(&self, bindings: &Bindings, scope: &RemapScope<'_>, source_data: &Value) -> RemapOutcome {
        let (source, target) = if self.config.rule_set(scope.source_id, scope.target_id).is_some() {
            (scope.source_id, scope.target_id)
        } else {
            (scope.source_family, scope.target_family)
        };
        let mut outcome = self.process_mapping(bindings, source, target, source_data);

        for fallback in [scope.target_id, scope.target_family] {
            if fallback != target {
                if let Some(defaults) = self.config.defaults_for(fallback) {
                    apply_defaults(&mut outcome.values, defaults, bindings);
                }
            }
        }
        outcome
    }

    fn apply_rule(
        &self,
        rule: &FieldMappingRule,
        bindings: &Bindings,
        source_data: &Value,
        values: &mut Bindings,
    ) -> Result<(), Error> {
        let failure = |message: String| Error::Processor {
            processor: rule.processor.clone(),
            rule: rule.label(),
            message,
        };

        let processor = self
            .processors
            .get(&rule.processor)
            .ok_or_else(|| failure("processor not registered".to_string()))?;
        if processor.signature().inputs != rule.from.arity() {
            return Err(failure(format!(
                "processor takes {} input(s) but the rule reads {}",
                processor.signature().inputs,
                rule.from.arity()
            )));
        }

        let inputs: Vec<Value> = rule
            .from
            .paths()
            .iter()
            .map(|path| read_input(path, bindings, source_data))
            .collect();
        if inputs.iter().all(Value::is_null) {
            log::debug!("Remap rule '{}' has no input values", rule.label());
            return Ok(());
        }

        let result = processor.process(&inputs).map_err(|err| failure(err.to_string()))?;
        scatter(&rule.to, result, values);
        Ok(())
    }
}

fn read_input(path: &Path, bindings: &Bindings, source_data: &Value) -> Value {
    if let Some(value) = bindings.get(&path.to_string()) {
        return value.clone();
    }
    path.lookup(source_data).cloned().unwrap_or(Value::Null)
}

/// One target path receives the result as is; several receive the
/// elements of a list result pairwise, or copies of a single result
fn scatter(to: &PathSpec, result: Value, values: &mut Bindings) {
    match to {
        PathSpec::Single(path) => {
            values.insert(path.to_string(), result);
        }
        PathSpec::Multiple(paths) => match result {
            Value::Array(items) => {
                for (path, item) in paths.iter().zip(items) {
                    values.insert(path.to_string(), item);
                }
            }
            single => {
                for path in paths {
                    values.insert(path.to_string(), single.clone());
                }
            }
        },
    }
}

fn apply_defaults(values: &mut Bindings, defaults: &serde_json::Map<String, Value>, bindings: &Bindings) {
    for (field, value) in defaults {
        if !values.contains_key(field) && !bindings.contains_key(field) {
            values.insert(field.clone(), value.clone());
        }
    }
}
