//! Named, pure field processors
//!
//! A processor turns the values read from a rule's `from` paths into the
//! value scattered over its `to` paths. Every processor declares whether it
//! takes one input or many and whether it produces one output or many; rule
//! validation checks declarations against how rules use them.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Separators between the two roads of an intersection, tried in order
const INTERSECTION_SEPARATORS: [&[char]; 2] = [&['与', '和', '及'], &['-']];

/// Joins the two roads when combining
const INTERSECTION_JOINER: &str = "与";

/// How many values a processor consumes or produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    One,
    Many,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::One => write!(f, "one"),
            Arity::Many => write!(f, "many"),
        }
    }
}

/// Input and output arity of a processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSignature {
    pub inputs: Arity,
    pub outputs: Arity,
}

impl ProcessorSignature {
    pub const fn new(inputs: Arity, outputs: Arity) -> Self {
        Self { inputs, outputs }
    }
}

/// Processor failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessorError {
    #[error("expected {expected} input(s), got {actual}")]
    Arity { expected: Arity, actual: usize },

    #[error("{0}")]
    Invalid(String),
}

/// A pure transform over positional inputs
pub trait Processor: Send + Sync {
    fn signature(&self) -> ProcessorSignature;

    fn process(&self, inputs: &[Value]) -> Result<Value, ProcessorError>;
}

type ProcessFn = dyn Fn(&[Value]) -> Result<Value, ProcessorError> + Send + Sync;

/// Processor backed by a closure
pub struct FnProcessor {
    signature: ProcessorSignature,
    function: Box<ProcessFn>,
}

impl FnProcessor {
    pub fn new<F>(signature: ProcessorSignature, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ProcessorError> + Send + Sync + 'static,
    {
        Self {
            signature,
            function: Box::new(function),
        }
    }
}

impl Processor for FnProcessor {
    fn signature(&self) -> ProcessorSignature {
        self.signature
    }

    fn process(&self, inputs: &[Value]) -> Result<Value, ProcessorError> {
        (self.function)(inputs)
    }
}

/// Copies its single input
pub struct DirectMapping;

impl Processor for DirectMapping {
    fn signature(&self) -> ProcessorSignature {
        ProcessorSignature::new(Arity::One, Arity::One)
    }

    fn process(&self, inputs: &[Value]) -> Result<Value, ProcessorError> {
        match inputs {
            [value] => Ok(value.clone()),
            _ => Err(ProcessorError::Arity { expected: Arity::One, actual: inputs.len() }),
        }
    }
}

/// Splits `"A与B"` into `["A", "B"]`
pub struct SplitIntersection;

impl Processor for SplitIntersection {
    fn signature(&self) -> ProcessorSignature {
        ProcessorSignature::new(Arity::One, Arity::Many)
    }

    fn process(&self, inputs: &[Value]) -> Result<Value, ProcessorError> {
        let [value] = inputs else {
            return Err(ProcessorError::Arity { expected: Arity::One, actual: inputs.len() });
        };
        let (primary, secondary) = split_intersection(&text_of(value));
        Ok(Value::Array(vec![Value::String(primary), Value::String(secondary)]))
    }
}

/// Joins `["A", "B"]` into `"A与B"`
pub struct CombineIntersection;

impl Processor for CombineIntersection {
    fn signature(&self) -> ProcessorSignature {
        ProcessorSignature::new(Arity::Many, Arity::One)
    }

    fn process(&self, inputs: &[Value]) -> Result<Value, ProcessorError> {
        let (primary, secondary) = match inputs {
            [] => return Err(ProcessorError::Arity { expected: Arity::Many, actual: 0 }),
            [primary] => (text_of(primary), String::new()),
            [primary, secondary] => (text_of(primary), text_of(secondary)),
            _ => {
                return Err(ProcessorError::Invalid(format!(
                    "an intersection has two roads, got {}",
                    inputs.len()
                )))
            }
        };
        Ok(Value::String(combine_intersection(&primary, &secondary)))
    }
}

/// Split an intersection description into its primary and secondary road.
///
/// Text without a recognized separator is the primary road alone. Parts
/// after the second are dropped.
pub fn split_intersection(text: &str) -> (String, String) {
    for separators in INTERSECTION_SEPARATORS {
        let mut parts = text.split(separators);
        if let (Some(primary), Some(secondary)) = (parts.next(), parts.next()) {
            return (primary.trim().to_string(), secondary.trim().to_string());
        }
    }
    (text.to_string(), String::new())
}

/// Join two roads into an intersection description
pub fn combine_intersection(primary: &str, secondary: &str) -> String {
    match (primary.is_empty(), secondary.is_empty()) {
        (false, false) => format!("{}{}{}", primary, INTERSECTION_JOINER, secondary),
        (false, true) => primary.to_string(),
        (true, false) => secondary.to_string(),
        (true, true) => String::new(),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Processors by name
#[derive(Clone, Default)]
pub struct ProcessorTable {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ProcessorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with `direct_mapping`, `split_intersection` and `combine_intersection`
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register("direct_mapping", DirectMapping);
        table.register("split_intersection", SplitIntersection);
        table.register("combine_intersection", CombineIntersection);
        table
    }

    /// Register or replace a processor
    pub fn register(&mut self, name: impl Into<String>, processor: impl Processor + 'static) {
        self.processors.insert(name.into(), Arc::new(processor));
    }

    /// Register a closure as a processor
    pub fn register_fn<F>(&mut self, name: impl Into<String>, signature: ProcessorSignature, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, ProcessorError> + Send + Sync + 'static,
    {
        self.register(name, FnProcessor::new(signature, function));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Processor>> {
        self.processors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProcessorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorTable").field("processors", &self.names()).finish()
    }
}
