//! Conversion context threaded through rendering
//!
//! A [`ConversionContext`] is never mutated after construction. Descending
//! into a field or a dynamic array element derives a new context, so a
//! pluggable function always sees the position it was called from. The
//! per-conversion data (families, source tree, conversion id, timestamp)
//! lives in one shared [`ConversionScope`].
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use crate::path::{Path, PathSegment};
use crate::types::{Bindings, DebugEvent, DebugEventKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// Prefix of generated conversion ids
pub const CONVERSION_ID_PREFIX: &str = "conv_";

/// Data shared by every context of one conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionScope {
    pub source_family: String,
    pub target_family: String,
    pub source_template_id: Option<String>,
    pub target_template_id: Option<String>,
    pub source_data: Value,
    pub conversion_id: String,
    pub timestamp: DateTime<Utc>,
    /// Length of the largest top-level sequence in the source data
    pub total_input_items: usize,
}

/// Position within a dynamic array
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    /// One-based position
    pub current: usize,
    pub total: usize,
    pub percentage: f64,
    pub is_last: bool,
}

/// Everything a pluggable function may inspect
#[derive(Debug, Clone)]
pub struct ConversionContext {
    scope: Arc<ConversionScope>,
    variables: Arc<Bindings>,
    debug: Arc<Mutex<Vec<DebugEvent>>>,
    array_path: Option<Path>,
    array_index: Option<usize>,
    array_total: Option<usize>,
    current_element: Option<Arc<Value>>,
    render_depth: usize,
    parent_path: Option<Path>,
    current_path: Path,
}

impl ConversionContext {
    /// Root context with a fresh conversion id and the current time
    pub fn new(
        source_family: impl Into<String>,
        target_family: impl Into<String>,
        source_data: Value,
        variables: Bindings,
    ) -> Self {
        let total_input_items = count_input_items(&source_data);
        let scope = ConversionScope {
            source_family: source_family.into(),
            target_family: target_family.into(),
            source_template_id: None,
            target_template_id: None,
            source_data,
            conversion_id: generate_conversion_id(),
            timestamp: Utc::now(),
            total_input_items,
        };
        Self {
            scope: Arc::new(scope),
            variables: Arc::new(variables),
            debug: Arc::new(Mutex::new(Vec::new())),
            array_path: None,
            array_index: None,
            array_total: None,
            current_element: None,
            render_depth: 0,
            parent_path: None,
            current_path: Path::root(),
        }
    }

    pub fn with_template_ids(mut self, source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        let scope = Arc::make_mut(&mut self.scope);
        scope.source_template_id = Some(source_id.into());
        scope.target_template_id = Some(target_id.into());
        self
    }

    pub fn with_conversion_id(mut self, conversion_id: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.scope).conversion_id = conversion_id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        Arc::make_mut(&mut self.scope).timestamp = timestamp;
        self
    }

    /// Context one field deeper
    pub fn at(&self, segment: PathSegment) -> Self {
        Self {
            current_path: self.current_path.append(segment),
            ..self.clone()
        }
    }

    /// Context of element `index` of `total` in the dynamic array declared
    /// at `array_path`, with the element's own bindings. `self` must be
    /// positioned at the output sequence.
    pub fn for_element(
        &self,
        array_path: &Path,
        index: usize,
        total: usize,
        element: &Value,
        variables: Bindings,
    ) -> Self {
        Self {
            scope: Arc::clone(&self.scope),
            variables: Arc::new(variables),
            debug: Arc::clone(&self.debug),
            array_path: Some(array_path.clone()),
            array_index: Some(index),
            array_total: Some(total),
            current_element: Some(Arc::new(element.clone())),
            render_depth: self.render_depth + 1,
            parent_path: Some(self.current_path.clone()),
            current_path: self.current_path.index(index as i64),
        }
    }

    pub fn scope(&self) -> &ConversionScope {
        &self.scope
    }

    pub fn source_family(&self) -> &str {
        &self.scope.source_family
    }

    pub fn target_family(&self) -> &str {
        &self.scope.target_family
    }

    pub fn source_template_id(&self) -> Option<&str> {
        self.scope.source_template_id.as_deref()
    }

    pub fn target_template_id(&self) -> Option<&str> {
        self.scope.target_template_id.as_deref()
    }

    pub fn source_data(&self) -> &Value {
        &self.scope.source_data
    }

    pub fn conversion_id(&self) -> &str {
        &self.scope.conversion_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.scope.timestamp
    }

    pub fn total_input_items(&self) -> usize {
        self.scope.total_input_items
    }

    pub fn variables(&self) -> &Bindings {
        &self.variables
    }

    /// Bound value of `name`; dotted names navigate into bound maps
    pub fn variable(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.variables.get(name) {
            return Some(value);
        }
        let mut parts = name.split('.');
        let mut current = self.variables.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Value at a path in the source data
    pub fn source_field(&self, path: &str) -> Option<&Value> {
        Path::parse(path).ok()?.lookup(&self.scope.source_data)
    }

    pub fn array_path(&self) -> Option<&Path> {
        self.array_path.as_ref()
    }

    pub fn array_index(&self) -> Option<usize> {
        self.array_index
    }

    pub fn array_total(&self) -> Option<usize> {
        self.array_total
    }

    pub fn current_element(&self) -> Option<&Value> {
        self.current_element.as_deref()
    }

    pub fn render_depth(&self) -> usize {
        self.render_depth
    }

    pub fn parent_path(&self) -> Option<&Path> {
        self.parent_path.as_ref()
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Elements of the enclosing array rendered before this one
    pub fn processed_items(&self) -> usize {
        self.array_index.unwrap_or(0)
    }

    pub fn is_array_context(&self) -> bool {
        self.array_index.is_some()
    }

    pub fn is_last(&self) -> bool {
        matches!((self.array_index, self.array_total), (Some(index), Some(total)) if index + 1 == total)
    }

    pub fn progress(&self) -> Option<Progress> {
        let (index, total) = (self.array_index?, self.array_total?);
        let current = index + 1;
        Some(Progress {
            current,
            total,
            percentage: if total == 0 { 0.0 } else { current as f64 * 100.0 / total as f64 },
            is_last: current == total,
        })
    }

    /// Ids of the templates this context renders between, source first
    pub fn ancestors(&self) -> Vec<&str> {
        self.source_template_id()
            .into_iter()
            .chain(self.target_template_id())
            .collect()
    }

    /// Record a degradation at the current path
    pub fn record(&self, kind: DebugEventKind, message: impl Into<String>) {
        let event = DebugEvent {
            kind,
            path: self.current_path.to_string(),
            message: message.into(),
        };
        self.debug.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }

    /// Events recorded so far by this conversion
    pub fn debug_events(&self) -> Vec<DebugEvent> {
        self.debug.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

pub(crate) fn generate_conversion_id() -> String {
    let suffix: u64 = rand::random::<u64>() & 0xffff_ffff_ffff;
    format!("{}{:012x}", CONVERSION_ID_PREFIX, suffix)
}

fn count_input_items(data: &Value) -> usize {
    data.as_object()
        .map(|fields| {
            fields
                .values()
                .filter_map(Value::as_array)
                .map(Vec::len)
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0)
}
