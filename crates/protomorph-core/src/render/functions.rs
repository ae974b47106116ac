//! Pluggable functions behind special variables
//!
//! A special variable `{{ __sid }}` is rendered by calling the function
//! registered as `func_sid` with the current [`ConversionContext`]. Functions
//! never abort rendering: a missing function or an error renders as
//! `[FUNC_ERROR:name]`.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::context::{ConversionContext, CONVERSION_ID_PREFIX};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Function failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("function '{0}' is not registered")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),
}

/// A function rendering a special variable
pub trait SpecialFunction: Send + Sync {
    fn call(&self, context: &ConversionContext) -> Result<String, FunctionError>;
}

impl<F> SpecialFunction for F
where
    F: Fn(&ConversionContext) -> String + Send + Sync,
{
    fn call(&self, context: &ConversionContext) -> Result<String, FunctionError> {
        Ok(self(context))
    }
}

/// Wraps a closure that can fail
pub struct Fallible<F>(pub F);

impl<F> SpecialFunction for Fallible<F>
where
    F: Fn(&ConversionContext) -> Result<String, FunctionError> + Send + Sync,
{
    fn call(&self, context: &ConversionContext) -> Result<String, FunctionError> {
        (self.0)(context)
    }
}

/// Functions by name
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn SpecialFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the reference catalog
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("func_sid", builtins::sid);
        registry.register("func_label", builtins::label);
        registry.register("func_priority", builtins::priority);
        registry.register("func_timestamp", builtins::timestamp);
        registry.register("func_session_id", builtins::session_id);
        registry.register("func_device_type", builtins::device_type);
        registry.register("func_array_index", builtins::array_index);
        registry.register("func_array_total", builtins::array_total);
        registry.register("func_is_last", builtins::is_last);
        registry
    }

    /// Register or replace a function
    pub fn register(&mut self, name: impl Into<String>, function: impl SpecialFunction + 'static) {
        let name = name.into();
        if self.functions.insert(name.clone(), Arc::new(function)).is_some() {
            log::debug!("Replaced special function '{}'", name);
        }
    }

    pub fn register_fallible<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&ConversionContext) -> Result<String, FunctionError> + Send + Sync + 'static,
    {
        self.register(name, Fallible(function));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SpecialFunction>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn call(&self, name: &str, context: &ConversionContext) -> Result<String, FunctionError> {
        self.get(name)
            .ok_or_else(|| FunctionError::NotFound(name.to_string()))?
            .call(context)
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry").field("functions", &self.names()).finish()
    }
}

/// Reference catalog
mod builtins {
    use super::*;

    fn text(value: Option<&Value>) -> &str {
        value.and_then(Value::as_str).unwrap_or("")
    }

    pub fn sid(ctx: &ConversionContext) -> String {
        let phone_type = text(ctx.variable("phone_type"));
        let sid = match (ctx.source_family(), ctx.target_family()) {
            ("A", "C") => match phone_type {
                "手机" => "PHONE_TYPE_MOBILE",
                "座机" => "PHONE_TYPE_LANDLINE",
                _ => "PHONE_TYPE_UNKNOWN",
            },
            ("B", "C") => "PHONE_TYPE_GENERIC",
            ("A", "B") => "PHONE_TYPE_LABEL",
            _ => "unknown",
        };
        sid.to_string()
    }

    pub fn label(ctx: &ConversionContext) -> String {
        match ctx.target_family() {
            "C" => "O",
            "B" => "B",
            _ => "GENERIC",
        }
        .to_string()
    }

    pub fn priority(ctx: &ConversionContext) -> String {
        let domain = text(ctx.source_field("domain"));
        let action = text(ctx.source_field("action"));
        match (domain, action) {
            ("telephone", "DIAL") => "HIGH",
            ("telephone", "ANSWER") => "MEDIUM",
            _ => "NORMAL",
        }
        .to_string()
    }

    pub fn timestamp(ctx: &ConversionContext) -> String {
        let format = if ctx.target_family() == "C" { "%Y-%m-%dT%H:%M:%S" } else { "%Y%m%d%H%M%S" };
        ctx.timestamp().format(format).to_string()
    }

    /// Derived from the conversion id and the element index, so repeated
    /// renders agree and elements of one array differ
    pub fn session_id(ctx: &ConversionContext) -> String {
        let id = ctx.conversion_id();
        let hex = id.strip_prefix(CONVERSION_ID_PREFIX).unwrap_or(id);
        let base = if ctx.target_family() == "C" {
            format!("session_{}", hex)
        } else {
            hex.chars().take(8).collect()
        };
        match ctx.array_index() {
            Some(index) => format!("{}_{}", base, index),
            None => base,
        }
    }

    pub fn device_type(ctx: &ConversionContext) -> String {
        match text(ctx.variable("phone_type")) {
            "手机" => "MOBILE",
            "座机" => "LANDLINE",
            "软电话" => "SOFTPHONE",
            _ => "UNKNOWN",
        }
        .to_string()
    }

    pub fn array_index(ctx: &ConversionContext) -> String {
        ctx.array_index().map(|index| index.to_string()).unwrap_or_default()
    }

    pub fn array_total(ctx: &ConversionContext) -> String {
        ctx.array_total().map(|total| total.to_string()).unwrap_or_default()
    }

    pub fn is_last(ctx: &ConversionContext) -> String {
        ctx.is_last().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::types::Bindings;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn context(source: &str, target: &str, phone_type: &str) -> ConversionContext {
        let mut variables = Bindings::new();
        variables.insert("phone_type".to_string(), json!(phone_type));
        ConversionContext::new(source, target, json!({"domain": "telephone", "action": "DIAL"}), variables)
            .with_conversion_id("conv_0123456789ab")
    }

    #[test]
    fn test_sid_by_family_pair() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(registry.call("func_sid", &context("A", "C", "手机")).unwrap(), "PHONE_TYPE_MOBILE");
        assert_eq!(registry.call("func_sid", &context("A", "C", "座机")).unwrap(), "PHONE_TYPE_LANDLINE");
        assert_eq!(registry.call("func_sid", &context("A", "C", "")).unwrap(), "PHONE_TYPE_UNKNOWN");
        assert_eq!(registry.call("func_sid", &context("B", "C", "")).unwrap(), "PHONE_TYPE_GENERIC");
        assert_eq!(registry.call("func_sid", &context("A", "B", "")).unwrap(), "PHONE_TYPE_LABEL");
        assert_eq!(registry.call("func_sid", &context("C", "A", "")).unwrap(), "unknown");
    }

    #[test]
    fn test_reference_catalog() {
        let registry = FunctionRegistry::with_builtins();
        let ctx = context("A", "C", "软电话");
        assert_eq!(registry.call("func_label", &ctx).unwrap(), "O");
        assert_eq!(registry.call("func_priority", &ctx).unwrap(), "HIGH");
        assert_eq!(registry.call("func_device_type", &ctx).unwrap(), "SOFTPHONE");
        assert_eq!(registry.call("func_session_id", &ctx).unwrap(), "session_0123456789ab");
        assert_eq!(registry.call("func_is_last", &ctx).unwrap(), "false");
        assert_eq!(registry.call("func_array_index", &ctx).unwrap(), "");
    }

    #[test]
    fn test_timestamp_uses_context_time() {
        let at = DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z").unwrap().with_timezone(&Utc);
        let registry = FunctionRegistry::with_builtins();
        let c = context("A", "C", "").with_timestamp(at);
        assert_eq!(registry.call("func_timestamp", &c).unwrap(), "2025-03-04T05:06:07");
        let b = context("A", "B", "").with_timestamp(at);
        assert_eq!(registry.call("func_timestamp", &b).unwrap(), "20250304050607");
    }

    #[test]
    fn test_session_ids_differ_per_element() {
        let registry = FunctionRegistry::with_builtins();
        let root = context("A", "B", "");
        let items = Path::parse("items").unwrap();
        let ids: Vec<String> = (0..3)
            .map(|i| {
                let element = root.for_element(&items, i, 3, &json!({}), Bindings::new());
                registry.call("func_session_id", &element).unwrap()
            })
            .collect();
        assert_eq!(ids, vec!["01234567_0", "01234567_1", "01234567_2"]);
    }

    #[test]
    fn test_custom_and_failing_functions() {
        let mut registry = FunctionRegistry::new();
        registry.register("func_greeting", |ctx: &ConversionContext| format!("hello {}", ctx.target_family()));
        registry.register_fallible("func_broken", |_: &ConversionContext| {
            Err(FunctionError::Failed("no data".to_string()))
        });
        let ctx = context("A", "B", "");
        assert_eq!(registry.call("func_greeting", &ctx).unwrap(), "hello B");
        assert_eq!(registry.call("func_broken", &ctx), Err(FunctionError::Failed("no data".to_string())));
        assert_eq!(
            registry.call("func_sid", &ctx),
            Err(FunctionError::NotFound("func_sid".to_string()))
        );
        assert_eq!(registry.names(), vec!["func_broken", "func_greeting"]);
    }
}
