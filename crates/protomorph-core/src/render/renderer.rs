//! Template rendering
//!
//! The renderer substitutes bindings into a target template. Rendering never
//! fails as a whole: an unbound variable renders as `[MISSING:name]`, a
//! failing function as `[FUNC_ERROR:name]`, and a failing filter chain
//! falls back to the unfiltered value. Every such degradation is recorded in
//! the context's debug events.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use super::context::ConversionContext;
use super::expander::ArrayExpander;
use super::filters::{apply_filter, display_value, is_blank};
use super::functions::FunctionRegistry;
use crate::config::RenderConfig;
use crate::expression::{parse_leaf, Expression, ExpressionKind, Fragment};
use crate::path::{Path, PathSegment};
use crate::remap::{FieldRemapper, RemapScope};
use crate::template::markers::significant_items;
use crate::template::{Template, TemplateFragment};
use crate::types::{Bindings, DebugEventKind};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Marker rendered for an unresolved variable
pub fn missing_marker(name: &str) -> String {
    format!("[MISSING:{}]", name)
}

/// Marker rendered for a failed function
pub fn function_error_marker(name: &str) -> String {
    format!("[FUNC_ERROR:{}]", name)
}

/// Renders target templates
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
    functions: FunctionRegistry,
    remapper: FieldRemapper,
    expander: ArrayExpander,
}

impl Renderer {
    pub fn new(config: RenderConfig, functions: FunctionRegistry, remapper: FieldRemapper) -> Self {
        let expander = ArrayExpander::new(config.max_render_depth);
        Self {
            config,
            functions,
            remapper,
            expander,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn remapper(&self) -> &FieldRemapper {
        &self.remapper
    }

    /// Render a whole target template
    pub fn render(&self, template: &Template, context: &ConversionContext) -> Value {
        self.render_fragment(template.body(), context)
    }

    /// Render a template or item fragment with the bindings of `context`
    pub fn render_fragment(&self, fragment: &TemplateFragment, context: &ConversionContext) -> Value {
        let mapped = if fragment.variables.has_kind(ExpressionKind::Mapping) {
            self.remap(context)
        } else {
            Bindings::new()
        };
        let scope = Scope { fragment, mapped: &mapped };
        self.render_node(&fragment.tree, &Path::root(), context, &scope)
    }

    fn remap(&self, context: &ConversionContext) -> Bindings {
        let remap_scope = RemapScope {
            source_id: context.source_template_id().unwrap_or_else(|| context.source_family()),
            source_family: context.source_family(),
            target_id: context.target_template_id().unwrap_or_else(|| context.target_family()),
            target_family: context.target_family(),
        };
        let outcome = self.remapper.process(context.variables(), &remap_scope, context.source_data());
        for failure in &outcome.failures {
            context.record(DebugEventKind::ProcessorFailed, failure.to_string());
        }
        outcome.values
    }

    fn render_node(&self, node: &Value, local: &Path, context: &ConversionContext, scope: &Scope<'_>) -> Value {
        match node {
            Value::Object(fields) => {
                let mut out = Map::with_capacity(fields.len());
                for (key, value) in fields {
                    let child_local = local.child(key.clone());
                    let child_context = context.at(PathSegment::key(key.clone()));
                    let rendered = match scope.fragment.marker_at(&child_local) {
                        Some(marker) => self.expander.expand(marker, &child_context, |item, element_context| {
                            self.render_fragment(item, element_context)
                        }),
                        None => self.render_node(value, &child_local, &child_context, scope),
                    };
                    out.insert(key.clone(), rendered);
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                if let Some(marker) = scope.fragment.marker_at(local) {
                    return self.expander.expand(marker, context, |item, element_context| {
                        self.render_fragment(item, element_context)
                    });
                }
                let rendered = significant_items(items)
                    .map(|(index, item)| {
                        let child_local = local.index(index as i64);
                        let child_context = context.at(PathSegment::ArrayIndex(index as i64));
                        self.render_node(item, &child_local, &child_context, scope)
                    })
                    .collect();
                Value::Array(rendered)
            }
            Value::String(text) => self.render_leaf(text, context, scope.mapped),
            other => other.clone(),
        }
    }

    /// Render one leaf string
    pub fn render_leaf(&self, text: &str, context: &ConversionContext, mapped: &Bindings) -> Value {
        let leaf = parse_leaf(text);

        if self.config.preserve_scalar_types {
            if let Some(expression) = leaf.single_expression() {
                if expression.kind != ExpressionKind::Special && expression.filters.is_empty() {
                    if let Some(value) = self.lookup(expression, context, mapped) {
                        return value;
                    }
                }
            }
        }

        let mut out = String::with_capacity(text.len());
        for fragment in &leaf.fragments {
            match fragment {
                Fragment::Literal(literal) => out.push_str(literal),
                Fragment::Comment(_) => {}
                Fragment::Control(raw) => {
                    context.record(DebugEventKind::ControlBlockSkipped, format!("control block '{}' not evaluated", raw));
                    if !self.config.strip_control_blocks {
                        out.push_str(raw);
                    }
                }
                Fragment::Expression(expression) => out.push_str(&self.render_expression(expression, context, mapped)),
                Fragment::Invalid(raw) => out.push_str(&self.fallback_render(raw, context)),
            }
        }
        Value::String(out)
    }

    /// Bound value of a regular or mapping expression, default applied
    fn lookup(&self, expression: &Expression, context: &ConversionContext, mapped: &Bindings) -> Option<Value> {
        let name = expression.qualified_name();
        let bound = match expression.kind {
            ExpressionKind::Mapping => mapped.get(&name).or_else(|| context.variable(&name)),
            _ => context.variable(&name),
        };
        match (bound, &expression.default) {
            (Some(value), Some(default)) if is_blank(value) => Some(default.clone()),
            (None, Some(default)) => Some(default.clone()),
            (value, _) => value.cloned(),
        }
    }

    fn render_expression(&self, expression: &Expression, context: &ConversionContext, mapped: &Bindings) -> String {
        let value = match expression.kind {
            ExpressionKind::Special => {
                let name = expression.function_name().unwrap_or_else(|| expression.name.clone());
                match self.functions.call(&name, context) {
                    Ok(result) => match &expression.default {
                        Some(default) if result.is_empty() => default.clone(),
                        _ => Value::String(result),
                    },
                    Err(err) => {
                        log::warn!("Function '{}' failed at '{}': {}", name, context.current_path(), err);
                        context.record(DebugEventKind::FunctionFailed, format!("{}: {}", name, err));
                        return function_error_marker(&name);
                    }
                }
            }
            ExpressionKind::Regular | ExpressionKind::Mapping => match self.lookup(expression, context, mapped) {
                Some(value) => value,
                None => {
                    let name = expression.qualified_name();
                    log::debug!("Unresolved variable '{}' at '{}'", name, context.current_path());
                    context.record(DebugEventKind::UnresolvedVariable, format!("'{}' has no binding", name));
                    return missing_marker(&name);
                }
            },
        };

        let mut filtered = value.clone();
        for filter in &expression.filters {
            match apply_filter(filter, filtered) {
                Ok(next) => filtered = next,
                Err(err) => {
                    log::warn!("Filter failed in '{}': {}; substituting the plain value", expression.source, err);
                    context.record(DebugEventKind::FilterFailed, format!("{}: {}", expression.source, err));
                    return display_value(&value);
                }
            }
        }
        display_value(&filtered)
    }

    /// Best-effort substitution for a block neither parse tier understood:
    /// `{{ name() }}` calls a function, `{{ name ... }}` substitutes the bare
    /// value or a quoted `default` argument
    fn fallback_render(&self, raw: &str, context: &ConversionContext) -> String {
        let Some(pattern) = block_pattern() else {
            return raw.to_string();
        };
        pattern
            .replace_all(raw, |captures: &Captures<'_>| {
                let body = captures[1].trim();
                let name = body
                    .split(|ch: char| ch == '|' || ch.is_whitespace())
                    .next()
                    .unwrap_or_default()
                    .trim_start_matches('$');

                if let Some(function) = name.strip_suffix("()") {
                    return self.functions.call(function, context).unwrap_or_else(|err| {
                        context.record(DebugEventKind::FunctionFailed, format!("{}: {}", function, err));
                        function_error_marker(function)
                    });
                }
                if let Some(value) = context.variable(name).filter(|value| !is_blank(value)) {
                    return display_value(value);
                }
                if let Some(default) = default_pattern().and_then(|pattern| pattern.captures(body)) {
                    return default[1].to_string();
                }
                context.record(DebugEventKind::UnresolvedVariable, format!("'{}' has no binding", name));
                missing_marker(name)
            })
            .into_owned()
    }
}

/// Per-fragment rendering state
struct Scope<'a> {
    fragment: &'a TemplateFragment,
    /// Remapper output for this scope's bindings
    mapped: &'a Bindings,
}

fn block_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$?\{\{(.*?)\}\}").ok())
        .as_ref()
}

fn default_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"default\s*\(?\s*['"]([^'"]*)['"]"#).ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remap::RemapConfig;
    use serde_json::json;

    fn bindings(value: Value) -> Bindings {
        match value {
            Value::Object(map) => map,
            _ => Bindings::new(),
        }
    }

    fn renderer() -> Renderer {
        Renderer::new(
            RenderConfig::default(),
            FunctionRegistry::with_builtins(),
            FieldRemapper::with_builtins(RemapConfig::intersection_routes()),
        )
    }

    fn context(variables: Value) -> ConversionContext {
        ConversionContext::new("A", "C", json!({}), bindings(variables)).with_conversion_id("conv_00000000abcd")
    }

    fn render(tree: Value, ctx: &ConversionContext) -> Value {
        let template = Template::analyze("C-1", "C", tree).unwrap();
        renderer().render(&template, ctx)
    }

    #[test]
    fn test_regular_and_special_variables() {
        let ctx = context(json!({"phone_type": "手机", "person": "张三"}));
        let out = render(
            json!({"sid": "{{ __sid }}", "contact": {"name": "{{ person }}"}, "n": 3, "flag": true}),
            &ctx,
        );
        assert_eq!(
            out,
            json!({"sid": "PHONE_TYPE_MOBILE", "contact": {"name": "张三"}, "n": 3, "flag": true})
        );
        assert!(ctx.debug_events().is_empty());
    }

    #[test]
    fn test_missing_and_function_errors_are_visible() {
        let ctx = context(json!({}));
        let out = render(json!({"a": "{{ nobody }}", "b": "{{ __unknown }}", "c": "{{ nope() }}"}), &ctx);
        assert_eq!(out["a"], json!("[MISSING:nobody]"));
        assert_eq!(out["b"], json!("[FUNC_ERROR:func_unknown]"));
        assert_eq!(out["c"], json!("[FUNC_ERROR:func_nope]"));
        let kinds: Vec<_> = ctx.debug_events().iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DebugEventKind::UnresolvedVariable,
                DebugEventKind::FunctionFailed,
                DebugEventKind::FunctionFailed
            ]
        );
        assert_eq!(ctx.debug_events()[0].path, "a");
    }

    #[test]
    fn test_filters_and_defaults() {
        let ctx = context(json!({"action": "dial", "city": "", "tags": ["a", "b"]}));
        let out = render(
            json!({
                "action": "{{ action | upper }}",
                "city": "{{ city | default('上海') }}",
                "district": "{{ district | default('长宁区') | upper }}",
                "count": "{{ tags | length }}",
                "broken": "{{ action | shuffle }}",
                "text": "Call {{ action | capitalize }} now"
            }),
            &ctx,
        );
        assert_eq!(out["action"], json!("DIAL"));
        assert_eq!(out["city"], json!("上海"));
        assert_eq!(out["district"], json!("长宁区"));
        assert_eq!(out["count"], json!("2"));
        assert_eq!(out["broken"], json!("dial"));
        assert_eq!(out["text"], json!("Call Dial now"));
        assert_eq!(ctx.debug_events()[0].kind, DebugEventKind::FilterFailed);
    }

    #[test]
    fn test_preserve_scalar_types() {
        let typed = Renderer::new(
            RenderConfig {
                preserve_scalar_types: true,
                ..RenderConfig::default()
            },
            FunctionRegistry::new(),
            FieldRemapper::default(),
        );
        let template = Template::analyze("C-1", "C", json!({"n": "{{ n }}", "s": "n={{ n }}"})).unwrap();
        let out = typed.render(&template, &context(json!({"n": 3})));
        assert_eq!(out, json!({"n": 3, "s": "n=3"}));
        let plain = renderer().render(&template, &context(json!({"n": 3})));
        assert_eq!(plain["n"], json!("3"));
    }

    #[test]
    fn test_control_blocks() {
        let ctx = context(json!({"x": 1}));
        let out = render(json!({"v": "{% if x %}yes{% endif %}"}), &ctx);
        assert_eq!(out["v"], json!("yes"));
        assert_eq!(ctx.debug_events().len(), 2);

        let keep = Renderer::new(
            RenderConfig {
                strip_control_blocks: false,
                ..RenderConfig::default()
            },
            FunctionRegistry::new(),
            FieldRemapper::default(),
        );
        let template = Template::analyze("C-1", "C", json!({"v": "{% if x %}yes"})).unwrap();
        assert_eq!(keep.render(&template, &context(json!({})))["v"], json!("{% if x %}yes"));
    }

    #[test]
    fn test_dynamic_array_with_nested_arrays() {
        let data = json!({
            "orders": [
                {"id": "o1", "lines": [{"sku": "a"}, {"sku": "b"}]},
                {"id": "o2", "lines": [{"sku": "c"}]}
            ]
        });
        let ctx = ConversionContext::new("A", "C", data, bindings(json!({"store": "s1"})));
        let out = render(
            json!({
                "orders": ["{# array_dynamic: true #}", {
                    "id": "{{ id }}",
                    "store": "{{ store }}",
                    "position": "{{ __array_index }}/{{ __array_total }}",
                    "lines": ["{# array_dynamic: true #}", {"sku": "{{ sku | upper }}", "last": "{{ __is_last }}"}]
                }]
            }),
            &ctx,
        );
        assert_eq!(
            out,
            json!({
                "orders": [
                    {"id": "o1", "store": "s1", "position": "0/2",
                     "lines": [{"sku": "A", "last": "false"}, {"sku": "B", "last": "true"}]},
                    {"id": "o2", "store": "s1", "position": "1/2",
                     "lines": [{"sku": "C", "last": "true"}]}
                ]
            })
        );
    }

    #[test]
    fn test_mapping_expressions_use_remapper() {
        let data = json!({"destination": "中山路与人民路"});
        let ctx = ConversionContext::new("A", "B", data, Bindings::new()).with_template_ids("A-4", "B-4");
        let template = Template::analyze(
            "B-4",
            "B",
            json!({
                "intersection": {
                    "primary_road": "${{ intersection.primary_road }}",
                    "secondary_road": "{{ $intersection.secondary_road }}"
                },
                "city": "${{ city }}",
                "urgency": "${{ urgency | upper }}"
            }),
        )
        .unwrap();
        let out = renderer().render(&template, &ctx);
        assert_eq!(out["intersection"]["primary_road"], json!("中山路"));
        assert_eq!(out["intersection"]["secondary_road"], json!("人民路"));
        assert_eq!(out["city"], json!("上海"));
        assert_eq!(out["urgency"], json!("NORMAL"));
    }

    #[test]
    fn test_fallback_render_of_invalid_blocks() {
        let ctx = context(json!({"city": "北京"}));
        let r = renderer();
        assert_eq!(r.fallback_render("{{ city ^^ }}", &ctx), "北京");
        assert_eq!(r.fallback_render("{{ town ^^ default '上海' }}", &ctx), "上海");
        assert_eq!(r.fallback_render("{{ town ^^ }}", &ctx), "[MISSING:town]");
        assert_eq!(r.fallback_render("{{ func_label() }}", &ctx), "O");
        assert_eq!(r.fallback_render("{{ func_nothing() }}", &ctx), "[FUNC_ERROR:func_nothing]");
    }
}
