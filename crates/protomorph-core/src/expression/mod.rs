//! Expression classification for template leaves
//!
//! A template leaf is a string that may embed placeholders between literal
//! text. This module splits a leaf into [`Fragment`]s and classifies every
//! variable placeholder as a regular, special, or mapping [`Expression`].
//!
//! Recognized delimiters:
//!
//! - `{{ name | filter }}` regular variable (special when the name starts with `__`)
//! - `${{ name }}` or `{{ $name }}` mapping expression
//! - `{% ... %}` control block, never produces bindings
//! - `{# ... #}` comment, stripped
//!
//! Parsing is two-tier: a strict grammar first, then a permissive regex
//! extraction. Both produce the same [`Expression`] type.
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

pub mod fallback;
pub mod scanner;
pub mod strict;

pub use scanner::{scan, RawFragment};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix marking a special variable bound to a pluggable function
pub const SPECIAL_PREFIX: &str = "__";

/// Prefix marking a mapping expression
pub const MAPPING_PREFIX: char = '$';

/// Comment body that marks a dynamic array
pub const ARRAY_MARKER: &str = "array_dynamic: true";

/// Placeholder classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpressionKind {
    /// Plain variable substituted from bindings
    Regular,
    /// Bound to a pluggable function named `func_<name>`
    Special,
    /// Resolved through field remapping rules
    Mapping,
}

/// Which parse tier produced an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseTier {
    Strict,
    Fallback,
}

/// A filter applied to a variable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), args: Vec::new() }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self { name: name.into(), args }
    }
}

/// A classified placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Binding name; mapping names carry no `$`, special names keep `__`
    pub name: String,
    /// Attribute accesses following the name (`user.address.city`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    /// Filters in application order, `default` excluded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Written in call form, `name()`
    #[serde(default)]
    pub call: bool,
    pub tier: ParseTier,
    /// Raw text including delimiters
    pub source: String,
}

impl Expression {
    /// Name of the pluggable function for special expressions
    pub fn function_name(&self) -> Option<String> {
        if self.kind != ExpressionKind::Special {
            return None;
        }
        if self.name.starts_with("func_") {
            return Some(self.name.clone());
        }
        Some(format!("func_{}", self.name.trim_start_matches(SPECIAL_PREFIX)))
    }

    /// Name with attribute accesses, `a.b.c`
    pub fn qualified_name(&self) -> String {
        if self.attributes.is_empty() {
            return self.name.clone();
        }
        let mut name = self.name.clone();
        for attribute in &self.attributes {
            name.push('.');
            name.push_str(attribute);
        }
        name
    }

    pub fn requires_context(&self) -> bool {
        self.kind != ExpressionKind::Regular
    }

    pub(crate) fn classify(
        raw_name: &str,
        mapping_delimiter: bool,
        call: bool,
    ) -> (ExpressionKind, String) {
        if mapping_delimiter || raw_name.starts_with(MAPPING_PREFIX) {
            let name = raw_name.trim_start_matches(MAPPING_PREFIX).to_string();
            (ExpressionKind::Mapping, name)
        } else if raw_name.starts_with(SPECIAL_PREFIX) || call {
            (ExpressionKind::Special, raw_name.to_string())
        } else {
            (ExpressionKind::Regular, raw_name.to_string())
        }
    }

    /// Move a `default(...)` filter into the default slot
    pub(crate) fn lift_default(filters: Vec<Filter>) -> (Vec<Filter>, Option<Value>) {
        let mut default = None;
        let kept = filters
            .into_iter()
            .filter_map(|filter| {
                if filter.name == "default" || filter.name == "d" {
                    default = Some(filter.args.into_iter().next().unwrap_or(Value::String(String::new())));
                    None
                } else {
                    Some(filter)
                }
            })
            .collect();
        (kept, default)
    }
}

/// One piece of a parsed leaf
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Literal(String),
    Expression(Expression),
    /// `{% ... %}` block, raw text
    Control(String),
    /// `{# ... #}` comment body
    Comment(String),
    /// A variable block neither tier could parse, raw text
    Invalid(String),
}

/// A leaf string split into fragments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLeaf {
    pub fragments: Vec<Fragment>,
}

impl ParsedLeaf {
    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.fragments.iter().filter_map(|fragment| match fragment {
            Fragment::Expression(expression) => Some(expression),
            _ => None,
        })
    }

    /// True when the leaf carries any template syntax besides comments
    pub fn has_expressions(&self) -> bool {
        self.fragments.iter().any(|fragment| {
            matches!(
                fragment,
                Fragment::Expression(_) | Fragment::Control(_) | Fragment::Invalid(_)
            )
        })
    }

    /// True when the leaf is nothing but comments and whitespace
    pub fn is_comment_only(&self) -> bool {
        let mut saw_comment = false;
        for fragment in &self.fragments {
            match fragment {
                Fragment::Comment(_) => saw_comment = true,
                Fragment::Literal(text) if text.trim().is_empty() => {}
                _ => return false,
            }
        }
        saw_comment
    }

    /// The leaf's only fragment, when it is an expression
    pub fn single_expression(&self) -> Option<&Expression> {
        match self.fragments.as_slice() {
            [Fragment::Expression(expression)] => Some(expression),
            _ => None,
        }
    }

    pub fn is_array_marker(&self) -> bool {
        self.is_comment_only()
            && self.fragments.iter().any(|fragment| match fragment {
                Fragment::Comment(body) => is_array_marker_comment(body),
                _ => false,
            })
    }
}

fn is_array_marker_comment(body: &str) -> bool {
    let normalized: String = body.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.contains(ARRAY_MARKER)
}

/// Parse a single variable block body with the strict grammar, falling back
/// to permissive extraction
pub fn parse_expression(body: &str, mapping_delimiter: bool, source: &str) -> Option<Expression> {
    match strict::try_strict_parse(body, mapping_delimiter, source) {
        Ok(expression) => Some(expression),
        Err(reason) => {
            log::debug!("Strict parse of '{}' failed ({}), using fallback", source, reason);
            fallback::fallback_regex_parse(body, mapping_delimiter, source)
        }
    }
}

/// Split a leaf string into classified fragments
pub fn parse_leaf(text: &str) -> ParsedLeaf {
    let fragments = scan(text)
        .into_iter()
        .map(|raw| match raw {
            RawFragment::Literal(text) => Fragment::Literal(text.to_string()),
            RawFragment::Variable { body, mapping, source } => {
                match parse_expression(body, mapping, source) {
                    Some(expression) => Fragment::Expression(expression),
                    None => Fragment::Invalid(source.to_string()),
                }
            }
            RawFragment::Control(source) => Fragment::Control(source.to_string()),
            RawFragment::Comment(body) => Fragment::Comment(body.trim().to_string()),
        })
        .collect();
    ParsedLeaf { fragments }
}

/// Parse a tree node when it is a string leaf
pub fn parse_value(value: &Value) -> Option<ParsedLeaf> {
    value.as_str().map(parse_leaf)
}

/// True when `value` is a string leaf carrying template syntax
pub fn is_expression_leaf(value: &Value) -> bool {
    parse_value(value).is_some_and(|leaf| leaf.has_expressions())
}

/// True when `value` is a string made only of comments
pub fn is_comment_leaf(value: &Value) -> bool {
    parse_value(value).is_some_and(|leaf| leaf.is_comment_only())
}
